//! Context-sensitive grammars and the two generation strategies: uniformly
//! random expansion and k-path-covering expansion.

pub mod atom;
pub mod context;
pub mod error;
pub mod grammar;
pub mod kpath;

pub use atom::{Atom, AtomPtr, Production, Rule, RuleRef};
pub use context::Context;
pub use error::{GrammarError, GrammarResult};
pub use grammar::Grammar;
pub use kpath::KPath;
