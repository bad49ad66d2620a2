//! The test driver: plan execution, trajectory hashing, and corpus growth.

pub mod config;
pub mod coverage;
pub mod driver;
pub mod error;

pub use config::Config;
pub use driver::{Failures, Test, TestCase, TestRun};
pub use error::{DriverError, DriverResult};
