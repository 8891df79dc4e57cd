//! In-memory run store.
//!
//! Behaves like the API server for the operations the passes use: list
//! filters by namespace and label selector, and get/delete of an absent
//! run fail with [`ClientError::NotFound`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use runsweep_core::{RunRef, WorkflowRun};

use crate::error::ClientError;
use crate::selector::LabelSelector;
use crate::store::RunStore;

/// Run store backed by a map, keyed by namespace and name.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    runs: RwLock<BTreeMap<RunRef, WorkflowRun>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given runs.
    pub fn with_runs(runs: impl IntoIterator<Item = WorkflowRun>) -> Self {
        let runs = runs
            .into_iter()
            .map(|run| (RunRef::from(&run), run))
            .collect();
        Self {
            runs: RwLock::new(runs),
        }
    }

    /// Insert or replace a run.
    pub async fn insert(&self, run: WorkflowRun) {
        self.runs.write().await.insert(RunRef::from(&run), run);
    }

    /// Returns true if the run is present.
    pub async fn contains(&self, namespace: &str, name: &str) -> bool {
        self.runs
            .read()
            .await
            .contains_key(&RunRef::new(namespace, name))
    }

    /// Get the number of stored runs.
    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    /// Returns true if no runs are stored.
    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}

#[async_trait]
impl RunStore for InMemoryStore {
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<WorkflowRun>, ClientError> {
        let runs = self.runs.read().await;
        Ok(runs
            .values()
            .filter(|run| namespace.is_empty() || run.namespace() == namespace)
            .filter(|run| selector.matches(&run.metadata.labels))
            .cloned()
            .collect())
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<WorkflowRun, ClientError> {
        let id = RunRef::new(namespace, name);
        self.runs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let id = RunRef::new(namespace, name);
        trace!(run = %id, "Deleting run from memory");
        match self.runs.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(ClientError::NotFound(id.to_string())),
        }
    }
}
