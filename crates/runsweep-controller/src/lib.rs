//! runsweep Controller Library
//!
//! This crate provides the two reconciliation passes over workflow runs:
//! the TTL reaper and the job-activity result extractor.

pub mod config;
pub mod error;
pub mod extractor;
pub mod reaper;

pub use config::Config;
pub use error::ControllerError;
pub use extractor::{scan, Extractor};
pub use reaper::{evaluate, Decision, Reaper, RunOutcome, SweepReport, SweepSummary};
