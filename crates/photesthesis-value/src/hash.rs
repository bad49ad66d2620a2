//! Streaming 64-bit hashing for plan identities and trajectories.
//!
//! Everything hashed here goes through the value text format first, so the
//! hash of a plan or a traced variable is stable across processes for a
//! given build.

use crate::symbol::Symbol;
use crate::value::Value;
use xxhash_rust::xxh64::{xxh64, Xxh64};

/// A streaming xxh64 hasher with the engine's fixed seed.
pub struct Hash64 {
    inner: Xxh64,
}

impl Hash64 {
    pub fn new() -> Hash64 {
        Hash64 {
            inner: Xxh64::new(0),
        }
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn add_str(&mut self, s: &str) {
        self.add_bytes(s.as_bytes());
    }

    pub fn add_symbol(&mut self, s: &Symbol) {
        self.add_str(s.as_str());
    }

    pub fn add_value(&mut self, v: &Value) {
        self.add_str(&v.to_string());
    }

    /// Mix `name "=" value`, the shape shared by plan params and traced
    /// variables.
    pub fn add_key_value(&mut self, key: &Symbol, value: &Value) {
        self.add_symbol(key);
        self.add_str("=");
        self.add_value(value);
    }

    pub fn add_u64(&mut self, x: u64) {
        self.add_bytes(&x.to_le_bytes());
    }

    pub fn finish(&self) -> u64 {
        self.inner.digest()
    }
}

impl Default for Hash64 {
    fn default() -> Self {
        Hash64::new()
    }
}

/// One-shot hash of a byte region.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    xxh64(bytes, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_matches_oneshot() {
        let mut h = Hash64::new();
        h.add_str("hello ");
        h.add_str("world");
        assert_eq!(h.finish(), hash_bytes(b"hello world"));
    }

    #[test]
    fn test_key_value_shape() {
        let k = Symbol::new("res").unwrap();
        let v = Value::int64(3);
        let mut h = Hash64::new();
        h.add_key_value(&k, &v);
        assert_eq!(h.finish(), hash_bytes(b"res=3"));
    }

    #[test]
    fn test_value_hash_uses_text_form() {
        let v = Value::list([Value::sym(Symbol::new("add").unwrap()), Value::int64(1)]);
        let mut h = Hash64::new();
        h.add_value(&v);
        assert_eq!(h.finish(), hash_bytes(b"(add 1)"));
    }
}
