//! Edge-counter integration.
//!
//! An instrumentation runtime hands the engine a region of 8-bit edge
//! counters once at startup via [`__sanitizer_cov_8bit_counters_init`].
//! The driver zeroes the region before each run and, afterwards, folds each
//! counter through the AFL count-class table before hashing, so small
//! variations in loop trip counts land in the same bucket. Builds without
//! instrumentation never call the hook and the driver falls back to the
//! user trajectory alone.

use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

static EDGE_START: AtomicPtr<u8> = AtomicPtr::new(std::ptr::null_mut());
static EDGE_LEN: AtomicUsize = AtomicUsize::new(0);

/// Hook invoked by the sanitizer coverage runtime with the bounds of the
/// 8-bit counter region.
#[no_mangle]
pub extern "C" fn __sanitizer_cov_8bit_counters_init(start: *mut u8, stop: *mut u8) {
    let len = (stop as usize).saturating_sub(start as usize);
    EDGE_START.store(start, Ordering::SeqCst);
    EDGE_LEN.store(len, Ordering::SeqCst);
}

/// Register a counter region directly, for embedders and tests that do not
/// link the sanitizer runtime.
///
/// # Safety
///
/// `start..start + len` must remain valid for reads and writes for the rest
/// of the process lifetime, and must only be mutated by instrumented code
/// running between the driver's trajectory init and fini (the engine is
/// single-threaded; see the concurrency contract).
pub unsafe fn register_edge_counters(start: *mut u8, len: usize) {
    EDGE_START.store(start, Ordering::SeqCst);
    EDGE_LEN.store(len, Ordering::SeqCst);
}

/// Run `f` over the registered region, or return `None` when no region has
/// been registered.
pub(crate) fn with_region<R>(f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
    let start = EDGE_START.load(Ordering::SeqCst);
    let len = EDGE_LEN.load(Ordering::SeqCst);
    if start.is_null() || len == 0 {
        return None;
    }
    // Reentrant driver invocation is forbidden, so this exclusive view is
    // the only one live.
    let region = unsafe { std::slice::from_raw_parts_mut(start, len) };
    Some(f(region))
}

/// AFL-style count classes: a counter value maps to the bucket
/// 0, 1, 2, 4, 8, 16, 32, 64, or 128.
pub(crate) const COUNTER_CLASSES: [u8; 256] = build_counter_classes();

const fn build_counter_classes() -> [u8; 256] {
    let mut table = [0u8; 256];
    table[1] = 1;
    table[2] = 2;
    table[3] = 4;
    let mut i = 4;
    while i < 8 {
        table[i] = 8;
        i += 1;
    }
    while i < 16 {
        table[i] = 16;
        i += 1;
    }
    while i < 32 {
        table[i] = 32;
        i += 1;
    }
    while i < 128 {
        table[i] = 64;
        i += 1;
    }
    while i < 256 {
        table[i] = 128;
        i += 1;
    }
    table
}
