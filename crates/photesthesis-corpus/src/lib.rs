//! Plans, transcripts, and the persistent corpus.

pub mod corpus;
pub mod error;
pub mod plan;
pub mod transcript;

pub use corpus::Corpus;
pub use error::{CorpusError, CorpusParseError, CorpusResult};
pub use plan::{ParamName, ParamSpecs, Params, Plan, PlanHash, RuleName, TestName, VarName};
pub use transcript::{Transcript, VarRecord};
