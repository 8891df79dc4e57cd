//! Exception report produced by the result extractor.

use serde::{Deserialize, Serialize};

use crate::ids::RunRef;
use crate::run::{TaskRunResult, TaskRunStatus};

/// Name prefix marking a task as a job-activity task.
pub const JOB_ACTIVITY_PREFIX: &str = "job-activity-";

/// A job-activity task whose outcome is not yet a success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRecord {
    /// Pipeline task name of the offending task.
    pub task_name: String,

    /// Results recorded by the task at inspection time.
    pub results: Vec<TaskRunResult>,
}

impl From<&TaskRunStatus> for ExceptionRecord {
    fn from(task_run: &TaskRunStatus) -> Self {
        Self {
            task_name: task_run.pipeline_task_name.clone(),
            results: task_run.results().to_vec(),
        }
    }
}

/// Exception records collected from one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub run: RunRef,

    pub exceptions: Vec<ExceptionRecord>,
}

impl RunReport {
    /// Returns true if no task was reported.
    pub fn is_clean(&self) -> bool {
        self.exceptions.is_empty()
    }
}
