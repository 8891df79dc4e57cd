//! runsweep Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - The cluster API client
//! - Network/TLS
//! - Runtime specifics
//!
//! The types mirror the parts of Tekton's `PipelineRun` resource that the
//! reaper and the result extractor read.

pub mod error;
pub mod ids;
pub mod report;
pub mod run;
pub mod status;
pub mod ttl;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::RunRef;
pub use report::{ExceptionRecord, RunReport, JOB_ACTIVITY_PREFIX};
pub use run::{
    Condition, ObjectMeta, ResultValue, RunSpec, RunStatus, TaskRunResult, TaskRunState,
    TaskRunStatus, WorkflowRun,
};
pub use status::{ConditionStatus, Outcome, RunPhase, CONDITION_SUCCEEDED};
pub use ttl::{SkipReason, Ttl, TTL_LABEL};
