//! Condition and phase enums for workflow runs and their task runs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::run::Condition;

/// Condition type carrying the outcome of a run or task run.
pub const CONDITION_SUCCEEDED: &str = "Succeeded";

/// `spec.status` values that request cancellation of a run.
pub const CANCEL_REQUESTS: &[&str] = &["Cancelled", "CancelledRunFinally", "StoppedRunFinally"];

/// Condition reasons the pipeline engine sets on a cancelled run.
const CANCELLED_REASONS: &[&str] = &["Cancelled", "PipelineRunCancelled"];

/// Wire-level tri-state of a condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// Interpreted outcome of a `Succeeded` condition.
///
/// Kept distinct from a boolean so "not yet decided" never reads as
/// "decided false".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Condition status `True`.
    Succeeded,
    /// Condition status `False`.
    Failed,
    /// Condition status `Unknown`, or no `Succeeded` condition reported yet.
    Pending,
}

impl Outcome {
    /// Read the `Succeeded` condition out of a condition list.
    ///
    /// A missing condition is `Pending`: the task has not reported a
    /// terminal outcome.
    pub fn from_conditions(conditions: &[Condition]) -> Self {
        succeeded_condition(conditions)
            .map(|c| Self::from(c.status))
            .unwrap_or(Self::Pending)
    }
}

impl From<ConditionStatus> for Outcome {
    fn from(status: ConditionStatus) -> Self {
        match status {
            ConditionStatus::True => Self::Succeeded,
            ConditionStatus::False => Self::Failed,
            ConditionStatus::Unknown => Self::Pending,
        }
    }
}

/// Lifecycle phase of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    /// Pending or executing.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with a failure.
    Failed,
    /// Cancellation was requested or the engine reported a cancelled outcome.
    Cancelled,
}

impl RunPhase {
    /// Derive the phase from the run's cancel request and conditions.
    pub fn resolve(spec_status: Option<&str>, conditions: &[Condition]) -> Self {
        if spec_status.is_some_and(|s| CANCEL_REQUESTS.contains(&s)) {
            return Self::Cancelled;
        }

        match succeeded_condition(conditions) {
            Some(c) => match c.status {
                ConditionStatus::True => Self::Succeeded,
                ConditionStatus::False
                    if c
                        .reason
                        .as_deref()
                        .is_some_and(|r| CANCELLED_REASONS.contains(&r)) =>
                {
                    Self::Cancelled
                }
                ConditionStatus::False => Self::Failed,
                ConditionStatus::Unknown => Self::Running,
            },
            None => Self::Running,
        }
    }

    /// Returns true if the run is done or cancelled.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

fn succeeded_condition(conditions: &[Condition]) -> Option<&Condition> {
    conditions.iter().find(|c| c.type_ == CONDITION_SUCCEEDED)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn succeeded(status: ConditionStatus, reason: Option<&str>) -> Vec<Condition> {
        let mut condition = Condition::succeeded(status);
        condition.reason = reason.map(str::to_string);
        vec![condition]
    }

    #[test]
    fn test_outcome_from_conditions() {
        assert_eq!(
            Outcome::from_conditions(&succeeded(ConditionStatus::True, None)),
            Outcome::Succeeded
        );
        assert_eq!(
            Outcome::from_conditions(&succeeded(ConditionStatus::False, None)),
            Outcome::Failed
        );
        assert_eq!(
            Outcome::from_conditions(&succeeded(ConditionStatus::Unknown, None)),
            Outcome::Pending
        );
    }

    #[test]
    fn test_missing_condition_is_pending() {
        let other = vec![Condition {
            type_: "Ready".to_string(),
            status: ConditionStatus::True,
            ..Condition::default()
        }];
        assert_eq!(Outcome::from_conditions(&other), Outcome::Pending);
        assert_eq!(Outcome::from_conditions(&[]), Outcome::Pending);
    }

    #[test]
    fn test_run_phase_from_condition() {
        let phase = |status, reason| RunPhase::resolve(None, &succeeded(status, reason));

        assert_eq!(phase(ConditionStatus::True, Some("Succeeded")), RunPhase::Succeeded);
        assert_eq!(phase(ConditionStatus::False, Some("Failed")), RunPhase::Failed);
        assert_eq!(
            phase(ConditionStatus::False, Some("PipelineRunCancelled")),
            RunPhase::Cancelled
        );
        assert_eq!(phase(ConditionStatus::Unknown, Some("Running")), RunPhase::Running);
        assert_eq!(RunPhase::resolve(None, &[]), RunPhase::Running);
    }

    #[test]
    fn test_cancel_request_wins_over_condition() {
        let conditions = succeeded(ConditionStatus::Unknown, Some("Running"));
        assert_eq!(
            RunPhase::resolve(Some("Cancelled"), &conditions),
            RunPhase::Cancelled
        );
        assert_eq!(
            RunPhase::resolve(Some("StoppedRunFinally"), &conditions),
            RunPhase::Cancelled
        );
        assert_eq!(
            RunPhase::resolve(Some("PipelineRunPending"), &conditions),
            RunPhase::Running
        );
    }

    #[test]
    fn test_terminal_phases() {
        assert!(!RunPhase::Running.is_terminal());
        assert!(RunPhase::Succeeded.is_terminal());
        assert!(RunPhase::Failed.is_terminal());
        assert!(RunPhase::Cancelled.is_terminal());
    }
}
