//! Process-wide interned identifiers.
//!
//! A [`Symbol`] names rules, parameters, tests, and transcript variables.
//! Interning deduplicates the backing strings so equality is a pointer
//! comparison and clones are reference-count bumps.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;

/// Error produced when interning a malformed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("symbol must contain only alphanumerics or underscores: {text:?}")]
    InvalidChar { text: String },
}

/// An interned identifier drawn from `[A-Za-z0-9_]*`.
///
/// The empty symbol is permitted and serves as a sentinel (e.g. the plan of
/// a transcript that has not been seeded yet). Ordering is by content;
/// equality is by handle identity, which interning makes equivalent.
#[derive(Clone)]
pub struct Symbol(Arc<str>);

fn intern_table() -> &'static Mutex<BTreeSet<Arc<str>>> {
    static TABLE: OnceLock<Mutex<BTreeSet<Arc<str>>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(BTreeSet::new()))
}

impl Symbol {
    /// Intern `text`, returning the canonical handle for it.
    pub fn new(text: &str) -> Result<Symbol, SymbolError> {
        if !text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SymbolError::InvalidChar {
                text: text.to_string(),
            });
        }
        let mut table = intern_table().lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = table.get(text) {
            return Ok(Symbol(existing.clone()));
        }
        let handle: Arc<str> = Arc::from(text);
        table.insert(handle.clone());
        Ok(Symbol(handle))
    }

    /// The empty sentinel symbol.
    pub fn empty() -> Symbol {
        // The empty string trivially satisfies the character check.
        Symbol::new("").unwrap_or_else(|_| unreachable!())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Symbol::empty()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        // Interning guarantees one handle per string, so pointer identity
        // is exactly content equality.
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.as_ref().cmp(other.0.as_ref())
    }
}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_ref().hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_identity() {
        let a = Symbol::new("expr").unwrap();
        let b = Symbol::new("expr").unwrap();
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn test_rejects_bad_chars() {
        assert!(Symbol::new("ok_name_9").is_ok());
        assert!(Symbol::new("has space").is_err());
        assert!(Symbol::new("hy-phen").is_err());
        assert!(Symbol::new("uni\u{e9}").is_err());
    }

    #[test]
    fn test_empty_sentinel() {
        let s = Symbol::empty();
        assert!(s.is_empty());
        assert_eq!(s, Symbol::new("").unwrap());
    }

    #[test]
    fn test_order_is_by_content() {
        let a = Symbol::new("aaa").unwrap();
        let b = Symbol::new("bbb").unwrap();
        assert!(a < b);
        assert!(b > a);
        assert_eq!(a.cmp(&a), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_concurrent_intern() {
        use std::thread;
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| Symbol::new("shared_between_threads").unwrap()))
            .collect();
        let syms: Vec<Symbol> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for s in &syms[1..] {
            assert_eq!(*s, syms[0]);
        }
    }
}
