//! Corpus error types.

use photesthesis_value::{SymbolError, ValueParseError};
use std::path::PathBuf;
use thiserror::Error;

/// Structural cause of a corpus file parse failure.
#[derive(Debug, Error)]
pub enum CorpusParseError {
    #[error("malformed transcript header: {line:?}")]
    MalformedHeader { line: String },

    #[error("malformed line: {line:?}")]
    MalformedLine { line: String },

    #[error("param line after transcript records: {line:?}")]
    ParamAfterRecords { line: String },

    #[error("stored hash 0x{stored:016x} does not match recomputed plan hash 0x{computed:016x}")]
    HashMismatch { stored: u64, computed: u64 },

    #[error(transparent)]
    Value(#[from] ValueParseError),

    #[error(transparent)]
    Symbol(#[from] SymbolError),
}

/// Errors on the corpus and plan surface.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("unknown param: {param}")]
    UnknownParam { param: photesthesis_value::Symbol },

    #[error("duplicate param: {param}")]
    DuplicateParam { param: photesthesis_value::Symbol },

    #[error("duplicate plan for test {test}: 0x{hash:016x}")]
    DuplicatePlan {
        test: photesthesis_value::Symbol,
        hash: u64,
    },

    #[error("no such plan for test {test}: 0x{hash:016x}")]
    NoSuchPlan {
        test: photesthesis_value::Symbol,
        hash: u64,
    },

    #[error("param {param} does not hold a rule-headed value")]
    MalformedParamValue { param: photesthesis_value::Symbol },

    #[error("error parsing corpus file {path:?} at line {line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: CorpusParseError,
    },

    #[error("corpus io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type CorpusResult<T> = Result<T, CorpusError>;
