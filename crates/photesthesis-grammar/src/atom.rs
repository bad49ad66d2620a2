//! Grammar building blocks: atoms, productions, and rules.

use photesthesis_corpus::{ParamName, RuleName};
use photesthesis_value::{Symbol, Value};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Atoms are shared between productions, k-paths, and expansion stacks.
pub type AtomPtr = Arc<Atom>;

static NEXT_TAG: AtomicU64 = AtomicU64::new(0);

/// A reference to a named rule. Every occurrence carries a fresh tag, so two
/// refs to the same rule at different places in a grammar have distinct
/// identities when reasoning about k-paths. The `ctx_ext` flags are pushed
/// onto the context while the subtree under this ref is expanded.
#[derive(Debug, Clone)]
pub struct RuleRef {
    tag: u64,
    rule: RuleName,
    ctx_ext: BTreeSet<ParamName>,
}

impl RuleRef {
    fn new(rule: RuleName, ctx_ext: BTreeSet<ParamName>) -> RuleRef {
        RuleRef {
            tag: NEXT_TAG.fetch_add(1, AtomicOrdering::Relaxed),
            rule,
            ctx_ext,
        }
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn rule(&self) -> &RuleName {
        &self.rule
    }

    pub fn ctx_ext(&self) -> &BTreeSet<ParamName> {
        &self.ctx_ext
    }
}

/// A terminal (`Lit`) or nonterminal (`Ref`) position in a production.
///
/// Equality and order are what k-path bookkeeping needs: refs compare by
/// tag identity, literals by value, and literals sort before refs.
#[derive(Debug)]
pub enum Atom {
    Lit(Value),
    Ref(RuleRef),
}

impl Atom {
    pub fn lit(v: Value) -> AtomPtr {
        Arc::new(Atom::Lit(v))
    }

    pub fn sym(s: Symbol) -> AtomPtr {
        Atom::lit(Value::sym(s))
    }

    pub fn bool(b: bool) -> AtomPtr {
        Atom::lit(Value::bool(b))
    }

    pub fn int64(i: i64) -> AtomPtr {
        Atom::lit(Value::int64(i))
    }

    pub fn blob(bytes: impl Into<Vec<u8>>) -> AtomPtr {
        Atom::lit(Value::blob(bytes))
    }

    pub fn string(s: impl AsRef<str>) -> AtomPtr {
        Atom::lit(Value::string(s))
    }

    /// A fresh ref to `rule` with no context extension.
    pub fn rule_ref(rule: RuleName) -> AtomPtr {
        Arc::new(Atom::Ref(RuleRef::new(rule, BTreeSet::new())))
    }

    /// A fresh ref to `rule` that introduces `flags` while its subtree is
    /// expanded.
    pub fn rule_ref_extending(
        rule: RuleName,
        flags: impl IntoIterator<Item = ParamName>,
    ) -> AtomPtr {
        Arc::new(Atom::Ref(RuleRef::new(rule, flags.into_iter().collect())))
    }

    pub fn as_lit(&self) -> Option<&Value> {
        match self {
            Atom::Lit(v) => Some(v),
            Atom::Ref(_) => None,
        }
    }

    pub fn as_rule_ref(&self) -> Option<&RuleRef> {
        match self {
            Atom::Lit(_) => None,
            Atom::Ref(r) => Some(r),
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Atom::Ref(_))
    }

    fn rank(&self) -> u8 {
        match self {
            Atom::Lit(_) => 0,
            Atom::Ref(_) => 1,
        }
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Atom::Lit(a), Atom::Lit(b)) => a == b,
            (Atom::Ref(a), Atom::Ref(b)) => a.tag == b.tag,
            _ => false,
        }
    }
}

impl Eq for Atom {}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Atom {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Atom::Lit(a), Atom::Lit(b)) => a.cmp(b),
            (Atom::Ref(a), Atom::Ref(b)) => a.tag.cmp(&b.tag),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// One alternative of a rule: a sequence of atoms, active only when every
/// flag in `ctx_req` is present in the expansion context.
#[derive(Debug, Clone)]
pub struct Production {
    atoms: Vec<AtomPtr>,
    ctx_req: BTreeSet<ParamName>,
    has_refs: bool,
}

impl Production {
    pub fn new(atoms: Vec<AtomPtr>) -> Production {
        Production::guarded(atoms, [])
    }

    pub fn guarded(atoms: Vec<AtomPtr>, ctx_req: impl IntoIterator<Item = ParamName>) -> Production {
        let has_refs = atoms.iter().any(|a| a.is_ref());
        Production {
            atoms,
            ctx_req: ctx_req.into_iter().collect(),
            has_refs,
        }
    }

    pub fn atoms(&self) -> &[AtomPtr] {
        &self.atoms
    }

    pub fn ctx_req(&self) -> &BTreeSet<ParamName> {
        &self.ctx_req
    }

    pub fn has_refs(&self) -> bool {
        self.has_refs
    }
}

/// A named set of productions.
#[derive(Debug, Clone)]
pub struct Rule {
    productions: Vec<Production>,
}

impl Rule {
    pub fn new(productions: Vec<Production>) -> Rule {
        Rule { productions }
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }
}
