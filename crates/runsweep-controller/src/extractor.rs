//! Result extractor - collects results of unresolved job-activity tasks.

use std::sync::Arc;

use tracing::{debug, info};

use runsweep_client::{LabelSelector, RunStore};
use runsweep_core::{ExceptionRecord, Outcome, RunRef, RunReport, WorkflowRun};

use crate::config::Config;
use crate::error::{scope, ControllerError};

/// Collect exception records from a run's task runs.
///
/// A task is reported when its pipeline task name starts with `prefix` and
/// its `Succeeded` condition is still `Unknown`. Records come out in
/// task-run identifier order.
pub fn scan(run: &WorkflowRun, prefix: &str) -> Vec<ExceptionRecord> {
    run.status
        .task_runs
        .values()
        .filter(|task_run| task_run.pipeline_task_name.starts_with(prefix))
        .filter(|task_run| task_run.outcome() == Outcome::Pending)
        .map(ExceptionRecord::from)
        .collect()
}

/// Result extractor.
pub struct Extractor {
    store: Arc<dyn RunStore>,
    config: Config,
}

impl Extractor {
    /// Create a new Extractor.
    pub fn new(store: Arc<dyn RunStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Build the report for the run called `name`.
    ///
    /// With a namespace the run is fetched directly. Without one, the
    /// TTL-labelled runs of every namespace are listed and each run called
    /// `name` is reported.
    pub async fn extract(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<RunReport>, ControllerError> {
        let runs = if namespace.is_empty() {
            let selector = LabelSelector::exists(self.config.ttl_label.as_str());
            let runs: Vec<WorkflowRun> = self
                .list(namespace, &selector)
                .await?
                .into_iter()
                .filter(|run| run.name() == name)
                .collect();
            if runs.is_empty() {
                return Err(ControllerError::RunNotFound(format!("{}/{}", scope(namespace), name)));
            }
            runs
        } else {
            let id = RunRef::new(namespace, name);
            let run = self.store.get(namespace, name).await.map_err(|source| {
                if source.is_not_found() {
                    ControllerError::RunNotFound(id.to_string())
                } else {
                    ControllerError::Get {
                        run: id.to_string(),
                        source,
                    }
                }
            })?;
            vec![run]
        };

        Ok(runs.iter().map(|run| self.report(run)).collect())
    }

    /// Build one report per run matched by `selector`.
    pub async fn extract_matching(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<RunReport>, ControllerError> {
        let runs = self.list(namespace, selector).await?;
        Ok(runs.iter().map(|run| self.report(run)).collect())
    }

    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<WorkflowRun>, ControllerError> {
        self.store
            .list(namespace, selector)
            .await
            .map_err(|source| ControllerError::List {
                scope: scope(namespace).to_string(),
                source,
            })
    }

    fn report(&self, run: &WorkflowRun) -> RunReport {
        let id = RunRef::from(run);
        let exceptions = scan(run, &self.config.job_activity_prefix);

        for record in &exceptions {
            debug!(
                run = %id,
                task = %record.task_name,
                results = record.results.len(),
                "Unresolved job-activity task"
            );
        }
        info!(
            run = %id,
            task_runs = run.status.task_runs.len(),
            exceptions = exceptions.len(),
            "Scanned run"
        );

        RunReport { run: id, exceptions }
    }
}
