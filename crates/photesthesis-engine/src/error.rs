//! Driver error types.

use photesthesis_corpus::CorpusError;
use photesthesis_grammar::GrammarError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error("user-provided (trace/track) trajectory is unstable for plan 0x{plan_hash:016x}")]
    UnstableUserTrajectory { plan_hash: u64 },

    #[error(
        "unable to stabilize path trajectory for plan 0x{plan_hash:016x} after {retries} \
         retries; try raising PHOTESTHESIS_STABILITY_RETRIES"
    )]
    StabilizationFailed { plan_hash: u64, retries: u64 },

    #[error("test has no seed specs to generate plans from")]
    NoSeedSpecs,
}

pub type DriverResult<T> = Result<T, DriverError>;
