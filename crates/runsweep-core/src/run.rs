//! Workflow run and task run types.
//!
//! Field names follow the `tekton.dev/v1beta1` `PipelineRun` JSON layout.
//! Fields the reaper and extractor never read are not modelled and are
//! ignored on deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::status::{ConditionStatus, Outcome, RunPhase, CONDITION_SUCCEEDED};

/// One execution of a pipeline, tracked as a cluster resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Identity and labels.
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Desired state; only the cancel request is read.
    #[serde(default)]
    pub spec: RunSpec,

    /// Observed state written by the pipeline engine.
    #[serde(default)]
    pub status: RunStatus,
}

impl WorkflowRun {
    /// Create an empty run with the given identity.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                labels: BTreeMap::new(),
            },
            ..Self::default()
        }
    }

    /// Builder method to add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Builder method to set a run-level condition.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.status
            .conditions
            .retain(|c| c.type_ != condition.type_);
        self.status.conditions.push(condition);
        self
    }

    /// Builder method to set the completion time.
    pub fn with_completion_time(mut self, at: DateTime<Utc>) -> Self {
        self.status.completion_time = Some(at);
        self
    }

    /// Builder method to set the cancel request in `spec.status`.
    pub fn with_spec_status(mut self, status: impl Into<String>) -> Self {
        self.spec.status = Some(status.into());
        self
    }

    /// Builder method to record a task run under the given identifier.
    pub fn with_task_run(mut self, id: impl Into<String>, task_run: TaskRunStatus) -> Self {
        self.status.task_runs.insert(id.into(), task_run);
        self
    }

    /// Name of the run.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Namespace of the run.
    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Look up a label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RunPhase {
        RunPhase::resolve(self.spec.status.as_deref(), &self.status.conditions)
    }
}

/// Subset of Kubernetes object metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Subset of the run spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Cancel/pending request, e.g. `Cancelled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Observed state of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    /// Present once the run finished or was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,

    /// Task runs keyed by task-run identifier.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_runs: BTreeMap<String, TaskRunStatus>,
}

/// Per-task execution record nested inside a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunStatus {
    /// Logical task name from the pipeline definition.
    #[serde(default)]
    pub pipeline_task_name: String,

    #[serde(default)]
    pub status: TaskRunState,
}

impl TaskRunStatus {
    /// Create a task run record with no conditions or results.
    pub fn new(pipeline_task_name: impl Into<String>) -> Self {
        Self {
            pipeline_task_name: pipeline_task_name.into(),
            status: TaskRunState::default(),
        }
    }

    /// Builder method to set the `Succeeded` condition status.
    pub fn with_succeeded(mut self, status: ConditionStatus) -> Self {
        self.status
            .conditions
            .retain(|c| c.type_ != CONDITION_SUCCEEDED);
        self.status.conditions.push(Condition::succeeded(status));
        self
    }

    /// Builder method to append a string result.
    pub fn with_result(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.status.task_results.push(TaskRunResult::new(name, value));
        self
    }

    /// Outcome of the `Succeeded` condition.
    pub fn outcome(&self) -> Outcome {
        Outcome::from_conditions(&self.status.conditions)
    }

    /// Results recorded so far, in emission order.
    pub fn results(&self) -> &[TaskRunResult] {
        &self.status.task_results
    }
}

/// Conditions and results of one task run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunState {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_results: Vec<TaskRunResult>,
}

/// A status condition record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default)]
    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// A `Succeeded` condition with the given status.
    pub fn succeeded(status: ConditionStatus) -> Self {
        Self {
            type_: CONDITION_SUCCEEDED.to_string(),
            status,
            ..Self::default()
        }
    }

    /// Builder method to set the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// A named result produced by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunResult {
    pub name: String,

    /// Declared result type (`string`, `array`, `object`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    pub value: ResultValue,
}

impl TaskRunResult {
    /// Create a string-valued result.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            value: ResultValue::String(value.into()),
        }
    }
}

/// Value of a task result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    String(String),
    Array(Vec<String>),
    Object(BTreeMap<String, String>),
}
