//! TTL reaper - deletes finished runs whose TTL has elapsed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use runsweep_client::{LabelSelector, RunStore};
use runsweep_core::{RunPhase, RunRef, SkipReason, Ttl, WorkflowRun};

use crate::config::Config;
use crate::error::{scope, ControllerError};

/// What happened to one listed run during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run was deleted.
    Deleted,
    /// The run is expired but the pass is a dry run.
    WouldDelete,
    /// The run was already gone when the delete was issued.
    AlreadyGone,
    /// The run is finished but its TTL has not elapsed.
    Retained { expires_at: Option<DateTime<Utc>> },
    /// The run is not finished.
    Active { phase: RunPhase },
    /// The run carries unusable data.
    Skipped(SkipReason),
    /// The delete call failed.
    DeleteFailed(String),
}

/// Result of evaluating a run against its TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Delete the run.
    Expire { ttl: Ttl, completed_at: DateTime<Utc> },
    /// Leave the run alone.
    Keep(RunOutcome),
}

/// Decide whether `run` is past its TTL at `now`.
pub fn evaluate(run: &WorkflowRun, ttl_label: &str, now: DateTime<Utc>) -> Decision {
    let ttl = match Ttl::from_labels(&run.metadata.labels, ttl_label) {
        Ok(ttl) => ttl,
        Err(reason) => return Decision::Keep(RunOutcome::Skipped(reason)),
    };

    let phase = run.phase();
    if !phase.is_terminal() {
        return Decision::Keep(RunOutcome::Active { phase });
    }

    let Some(completed_at) = run.status.completion_time else {
        return Decision::Keep(RunOutcome::Skipped(SkipReason::MissingCompletionTime));
    };

    if ttl.is_expired(completed_at, now) {
        Decision::Expire { ttl, completed_at }
    } else {
        Decision::Keep(RunOutcome::Retained {
            expires_at: ttl.expires_at(completed_at),
        })
    }
}

/// Per-run outcomes of one pass, in list order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub outcomes: Vec<(RunRef, RunOutcome)>,
}

impl SweepReport {
    /// Record the outcome for a run.
    pub fn record(mut self, run: RunRef, outcome: RunOutcome) -> Self {
        self.outcomes.push((run, outcome));
        self
    }

    /// Outcome recorded for a run, if it was listed.
    pub fn outcome(&self, run: &RunRef) -> Option<&RunOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == run)
            .map(|(_, outcome)| outcome)
    }

    /// Runs deleted by this pass.
    pub fn deleted(&self) -> impl Iterator<Item = &RunRef> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, RunOutcome::Deleted))
            .map(|(id, _)| id)
    }

    /// Count outcomes by kind.
    pub fn summary(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for (_, outcome) in &self.outcomes {
            match outcome {
                RunOutcome::Deleted => summary.deleted += 1,
                RunOutcome::WouldDelete => summary.would_delete += 1,
                RunOutcome::AlreadyGone => summary.already_gone += 1,
                RunOutcome::Retained { .. } => summary.retained += 1,
                RunOutcome::Active { .. } => summary.active += 1,
                RunOutcome::Skipped(_) => summary.skipped += 1,
                RunOutcome::DeleteFailed(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Outcome counts of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub deleted: usize,
    pub would_delete: usize,
    pub already_gone: usize,
    pub retained: usize,
    pub active: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SweepSummary {
    /// Total number of runs evaluated.
    pub fn total(&self) -> usize {
        self.deleted
            + self.would_delete
            + self.already_gone
            + self.retained
            + self.active
            + self.skipped
            + self.failed
    }
}

/// TTL reaper.
pub struct Reaper {
    store: Arc<dyn RunStore>,
    config: Config,
}

impl Reaper {
    /// Create a new Reaper.
    pub fn new(store: Arc<dyn RunStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Run one pass over `namespace` (all namespaces if empty).
    pub async fn run(&self, namespace: &str) -> Result<SweepReport, ControllerError> {
        self.run_at(namespace, Utc::now()).await
    }

    /// Run one pass, evaluating elapsed time against `now`.
    ///
    /// Only the initial list can fail the pass. Every listed run gets an
    /// outcome in the report.
    pub async fn run_at(
        &self,
        namespace: &str,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, ControllerError> {
        let selector = LabelSelector::exists(self.config.ttl_label.as_str());
        let runs = self
            .store
            .list(namespace, &selector)
            .await
            .map_err(|source| ControllerError::List {
                scope: scope(namespace).to_string(),
                source,
            })?;

        info!(
            scope = scope(namespace),
            selector = %selector,
            count = runs.len(),
            dry_run = self.config.dry_run,
            "Listed TTL-labelled runs"
        );

        let mut report = SweepReport::default();
        for run in &runs {
            let id = RunRef::from(run);
            let outcome = self.reap(&id, run, now).await;
            report = report.record(id, outcome);
        }

        Ok(report)
    }

    async fn reap(&self, id: &RunRef, run: &WorkflowRun, now: DateTime<Utc>) -> RunOutcome {
        let (ttl, completed_at) = match evaluate(run, &self.config.ttl_label, now) {
            Decision::Expire { ttl, completed_at } => (ttl, completed_at),
            Decision::Keep(outcome) => {
                log_kept(id, &outcome);
                return outcome;
            }
        };

        if self.config.dry_run {
            info!(
                run = %id,
                ttl = %ttl,
                completed_at = %completed_at,
                "Run expired (dry run, not deleting)"
            );
            return RunOutcome::WouldDelete;
        }

        match self.store.delete(&id.namespace, &id.name).await {
            Ok(()) => {
                info!(run = %id, ttl = %ttl, completed_at = %completed_at, "Deleted expired run");
                RunOutcome::Deleted
            }
            Err(e) if e.is_not_found() => {
                info!(run = %id, "Expired run already deleted");
                RunOutcome::AlreadyGone
            }
            Err(e) => {
                warn!(run = %id, error = %e, "Failed to delete expired run");
                RunOutcome::DeleteFailed(e.to_string())
            }
        }
    }
}

fn log_kept(id: &RunRef, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Skipped(reason) => {
            warn!(run = %id, reason = %reason, "Skipping run");
        }
        RunOutcome::Active { phase } => {
            debug!(run = %id, phase = %phase, "Run not finished");
        }
        RunOutcome::Retained { expires_at } => {
            debug!(run = %id, expires_at = ?expires_at, "Run within TTL");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::TimeDelta;
    use runsweep_client::{ClientError, InMemoryStore};
    use runsweep_core::{Condition, ConditionStatus, CoreError, TTL_LABEL};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-14T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn finished(name: &str, ttl: &str, completed_secs_ago: i64) -> WorkflowRun {
        WorkflowRun::new("ci", name)
            .with_label(TTL_LABEL, ttl)
            .with_condition(Condition::succeeded(ConditionStatus::True).with_reason("Succeeded"))
            .with_completion_time(now() - TimeDelta::seconds(completed_secs_ago))
    }

    fn running(name: &str, ttl: &str) -> WorkflowRun {
        WorkflowRun::new("ci", name)
            .with_label(TTL_LABEL, ttl)
            .with_condition(Condition::succeeded(ConditionStatus::Unknown).with_reason("Running"))
    }

    fn reaper(store: Arc<dyn RunStore>) -> Reaper {
        Reaper::new(store, Config::default())
    }

    /// Store whose list or delete calls can be made to fail.
    struct FlakyStore {
        inner: InMemoryStore,
        fail_list: bool,
        fail_delete: Vec<String>,
    }

    #[async_trait]
    impl RunStore for FlakyStore {
        async fn list(
            &self,
            namespace: &str,
            selector: &LabelSelector,
        ) -> Result<Vec<WorkflowRun>, ClientError> {
            if self.fail_list {
                return Err(ClientError::Connection("connection refused".to_string()));
            }
            self.inner.list(namespace, selector).await
        }

        async fn get(&self, namespace: &str, name: &str) -> Result<WorkflowRun, ClientError> {
            self.inner.get(namespace, name).await
        }

        async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
            if self.fail_delete.iter().any(|n| n == name) {
                return Err(ClientError::Api {
                    status: 500,
                    message: "etcdserver: request timed out".to_string(),
                });
            }
            self.inner.delete(namespace, name).await
        }
    }

    #[test]
    fn test_ttl_boundary() {
        let ttl = 60;
        let expired = finished("old", "60", ttl + 1);
        let fresh = finished("new", "60", ttl - 1);

        assert!(matches!(
            evaluate(&expired, TTL_LABEL, now()),
            Decision::Expire { .. }
        ));
        assert!(matches!(
            evaluate(&fresh, TTL_LABEL, now()),
            Decision::Keep(RunOutcome::Retained { .. })
        ));
    }

    #[test]
    fn test_running_run_never_expires() {
        let mut run = running("busy", "0");
        // Even a stale completion time does not make a running run eligible.
        run.status.completion_time = Some(now() - TimeDelta::days(30));

        assert_eq!(
            evaluate(&run, TTL_LABEL, now()),
            Decision::Keep(RunOutcome::Active {
                phase: RunPhase::Running
            })
        );
    }

    #[test]
    fn test_failed_run_is_eligible() {
        let run = WorkflowRun::new("ci", "broken")
            .with_label(TTL_LABEL, "10")
            .with_condition(Condition::succeeded(ConditionStatus::False).with_reason("Failed"))
            .with_completion_time(now() - TimeDelta::seconds(11));

        assert!(matches!(evaluate(&run, TTL_LABEL, now()), Decision::Expire { .. }));
    }

    #[test]
    fn test_finished_without_completion_time_is_skipped() {
        let run = WorkflowRun::new("ci", "odd")
            .with_label(TTL_LABEL, "10")
            .with_spec_status("Cancelled");

        assert_eq!(
            evaluate(&run, TTL_LABEL, now()),
            Decision::Keep(RunOutcome::Skipped(SkipReason::MissingCompletionTime))
        );
    }

    #[tokio::test]
    async fn test_example_runs() {
        // A: cancelled 90s ago with a 60s TTL. B: finished 30s ago.
        // C: no TTL label.
        let a = WorkflowRun::new("ci", "a")
            .with_label(TTL_LABEL, "60")
            .with_spec_status("Cancelled")
            .with_condition(
                Condition::succeeded(ConditionStatus::False).with_reason("PipelineRunCancelled"),
            )
            .with_completion_time(now() - TimeDelta::seconds(90));
        let b = finished("b", "60", 30);
        let c = WorkflowRun::new("ci", "c")
            .with_condition(Condition::succeeded(ConditionStatus::True))
            .with_completion_time(now() - TimeDelta::days(365));

        let store = Arc::new(InMemoryStore::with_runs([a, b, c]));
        let report = reaper(store.clone()).run_at("ci", now()).await.unwrap();

        assert_eq!(report.outcome(&RunRef::new("ci", "a")), Some(&RunOutcome::Deleted));
        assert!(matches!(
            report.outcome(&RunRef::new("ci", "b")),
            Some(RunOutcome::Retained { .. })
        ));
        assert_eq!(report.outcome(&RunRef::new("ci", "c")), None);
        assert_eq!(report.outcomes.len(), 2);

        assert!(!store.contains("ci", "a").await);
        assert!(store.contains("ci", "b").await);
        assert!(store.contains("ci", "c").await);
    }

    #[tokio::test]
    async fn test_malformed_ttl_does_not_abort_pass() {
        let store = Arc::new(InMemoryStore::with_runs([
            finished("bad", "not-a-number", 3600),
            finished("good", "60", 3600),
        ]));

        let report = reaper(store.clone()).run_at("", now()).await.unwrap();

        assert!(matches!(
            report.outcome(&RunRef::new("ci", "bad")),
            Some(RunOutcome::Skipped(SkipReason::InvalidTtl(
                CoreError::MalformedTtl { .. }
            )))
        ));
        assert_eq!(
            report.outcome(&RunRef::new("ci", "good")),
            Some(&RunOutcome::Deleted)
        );
        assert!(store.contains("ci", "bad").await);
        assert!(!store.contains("ci", "good").await);
    }

    #[tokio::test]
    async fn test_delete_failure_is_isolated() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryStore::with_runs([
                finished("stuck", "60", 3600),
                finished("zeta", "60", 3600),
            ]),
            fail_list: false,
            fail_delete: vec!["stuck".to_string()],
        });

        let report = reaper(store.clone()).run_at("ci", now()).await.unwrap();

        assert!(matches!(
            report.outcome(&RunRef::new("ci", "stuck")),
            Some(RunOutcome::DeleteFailed(message)) if message.contains("timed out")
        ));
        assert_eq!(
            report.outcome(&RunRef::new("ci", "zeta")),
            Some(&RunOutcome::Deleted)
        );
        assert_eq!(report.summary().failed, 1);
        assert_eq!(report.summary().deleted, 1);
    }

    #[tokio::test]
    async fn test_list_failure_fails_pass() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryStore::new(),
            fail_list: true,
            fail_delete: Vec::new(),
        });

        let err = reaper(store).run_at("", now()).await.unwrap_err();
        match err {
            ControllerError::List { scope, source } => {
                assert_eq!(scope, "all namespaces");
                assert!(matches!(source, ClientError::Connection(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_deletion_is_tolerated() {
        let run = finished("twice", "60", 3600);

        // Another reaper removes the run between our list and our delete.
        struct RacingStore(InMemoryStore, WorkflowRun);

        #[async_trait]
        impl RunStore for RacingStore {
            async fn list(
                &self,
                _namespace: &str,
                _selector: &LabelSelector,
            ) -> Result<Vec<WorkflowRun>, ClientError> {
                Ok(vec![self.1.clone()])
            }

            async fn get(&self, namespace: &str, name: &str) -> Result<WorkflowRun, ClientError> {
                self.0.get(namespace, name).await
            }

            async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
                self.0.delete(namespace, name).await
            }
        }

        let store = Arc::new(RacingStore(InMemoryStore::new(), run));
        let report = reaper(store).run_at("ci", now()).await.unwrap();

        assert_eq!(
            report.outcome(&RunRef::new("ci", "twice")),
            Some(&RunOutcome::AlreadyGone)
        );
        assert_eq!(report.summary().failed, 0);
    }

    #[tokio::test]
    async fn test_rerun_is_noop() {
        let store = Arc::new(InMemoryStore::with_runs([
            finished("old", "60", 3600),
            finished("new", "60", 5),
        ]));
        let reaper = reaper(store.clone());

        let first = reaper.run_at("ci", now()).await.unwrap();
        let second = reaper.run_at("ci", now()).await.unwrap();

        assert_eq!(first.deleted().count(), 1);
        assert_eq!(second.deleted().count(), 0);
        assert_eq!(second.summary().retained, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_dry_run_keeps_runs() {
        let store = Arc::new(InMemoryStore::with_runs([finished("old", "60", 3600)]));
        let config = Config {
            dry_run: true,
            ..Config::default()
        };

        let report = Reaper::new(store.clone(), config)
            .run_at("ci", now())
            .await
            .unwrap();

        assert_eq!(
            report.outcome(&RunRef::new("ci", "old")),
            Some(&RunOutcome::WouldDelete)
        );
        assert!(store.contains("ci", "old").await);
    }

    #[tokio::test]
    async fn test_running_runs_survive_pass() {
        let store = Arc::new(InMemoryStore::with_runs([
            running("busy", "0"),
            running("also-busy", "1"),
        ]));

        let report = reaper(store.clone()).run_at("ci", now()).await.unwrap();

        assert_eq!(report.summary().active, 2);
        assert_eq!(store.len().await, 2);
    }

    #[test]
    fn test_summary_totals() {
        let report = SweepReport::default()
            .record(RunRef::new("ci", "a"), RunOutcome::Deleted)
            .record(RunRef::new("ci", "b"), RunOutcome::AlreadyGone)
            .record(
                RunRef::new("ci", "c"),
                RunOutcome::Skipped(SkipReason::MissingCompletionTime),
            );

        let summary = report.summary();
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.already_gone, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total(), 3);
    }
}
