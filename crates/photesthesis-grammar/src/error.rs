//! Grammar error types.

use photesthesis_corpus::{CorpusError, RuleName};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("duplicate rule: {rule}")]
    DuplicateRule { rule: RuleName },

    #[error("rule not found: {rule}")]
    RuleNotFound { rule: RuleName },

    #[error("rule has no productions: {rule}")]
    EmptyRule { rule: RuleName },

    #[error("no active productions for rule {rule}")]
    NoActiveProductions { rule: RuleName },

    #[error("rule {rule} has only nonterminal productions left at the depth limit")]
    NeedsTerminalProduction { rule: RuleName },

    #[error("depth limit exhausted while expanding rule {rule}")]
    DepthExhausted { rule: RuleName },

    #[error(transparent)]
    Corpus(#[from] CorpusError),
}

pub type GrammarResult<T> = Result<T, GrammarError>;
