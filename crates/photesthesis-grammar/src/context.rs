//! Expansion contexts for context-sensitive productions.

use photesthesis_corpus::{ParamName, ParamSpecs};
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// The set of flags visible at a point of grammar expansion: the key set of
/// the active param specs plus a stack of locally pushed flags.
///
/// The local stack must be balanced on every exit from recursive expansion,
/// including error exits; [`Context::with_flags`] is the only way to push,
/// and it pops on the way out regardless of what the closure returns.
pub struct Context<'a> {
    global: &'a ParamSpecs,
    local: SmallVec<[ParamName; 8]>,
}

impl<'a> Context<'a> {
    pub fn new(specs: &'a ParamSpecs) -> Context<'a> {
        Context {
            global: specs,
            local: SmallVec::new(),
        }
    }

    pub fn has(&self, flag: &ParamName) -> bool {
        self.global.contains_key(flag) || self.local.iter().rev().any(|f| f == flag)
    }

    pub fn has_all(&self, flags: &BTreeSet<ParamName>) -> bool {
        flags.iter().all(|f| self.has(f))
    }

    /// Run `f` with `flags` pushed onto the local stack.
    pub fn with_flags<R>(
        &mut self,
        flags: &BTreeSet<ParamName>,
        f: impl FnOnce(&mut Context<'a>) -> R,
    ) -> R {
        let depth = self.local.len();
        self.local.extend(flags.iter().cloned());
        let result = f(self);
        self.local.truncate(depth);
        result
    }

    /// Depth of the local stack; used to check push/pop discipline.
    pub fn local_depth(&self) -> usize {
        self.local.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photesthesis_value::Symbol;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn specs(names: &[&str]) -> ParamSpecs {
        names
            .iter()
            .map(|n| (sym(n), sym("some_rule")))
            .collect()
    }

    #[test]
    fn test_global_flags_always_visible() {
        let specs = specs(&["n", "m"]);
        let ctx = Context::new(&specs);
        assert!(ctx.has(&sym("n")));
        assert!(ctx.has(&sym("m")));
        assert!(!ctx.has(&sym("x")));
    }

    #[test]
    fn test_local_flags_scoped() {
        let specs = specs(&[]);
        let mut ctx = Context::new(&specs);
        let flags = BTreeSet::from([sym("x")]);
        assert!(!ctx.has(&sym("x")));
        ctx.with_flags(&flags, |ctx| {
            assert!(ctx.has(&sym("x")));
            let inner = BTreeSet::from([sym("y")]);
            ctx.with_flags(&inner, |ctx| {
                assert!(ctx.has(&sym("x")));
                assert!(ctx.has(&sym("y")));
            });
            assert!(!ctx.has(&sym("y")));
        });
        assert!(!ctx.has(&sym("x")));
        assert_eq!(ctx.local_depth(), 0);
    }

    #[test]
    fn test_balanced_on_error_exit() {
        let specs = specs(&[]);
        let mut ctx = Context::new(&specs);
        let flags = BTreeSet::from([sym("x"), sym("y")]);
        let result: Result<(), ()> = ctx.with_flags(&flags, |ctx| {
            assert_eq!(ctx.local_depth(), 2);
            Err(())
        });
        assert!(result.is_err());
        assert_eq!(ctx.local_depth(), 0);
    }

    #[test]
    fn test_has_all() {
        let specs = specs(&["n"]);
        let mut ctx = Context::new(&specs);
        let req = BTreeSet::from([sym("n"), sym("x")]);
        assert!(!ctx.has_all(&req));
        ctx.with_flags(&BTreeSet::from([sym("x")]), |ctx| {
            assert!(ctx.has_all(&req));
        });
        assert!(ctx.has_all(&BTreeSet::new()));
    }
}
