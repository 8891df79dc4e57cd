//! Resource store abstraction for workflow runs.

use async_trait::async_trait;

use runsweep_core::WorkflowRun;

use crate::error::ClientError;
use crate::selector::LabelSelector;

/// Read/delete access to workflow-run resources.
///
/// An empty `namespace` in [`RunStore::list`] means all namespaces.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// List runs whose labels satisfy `selector`.
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<WorkflowRun>, ClientError>;

    /// Fetch one run. Fails with [`ClientError::NotFound`] if absent.
    async fn get(&self, namespace: &str, name: &str) -> Result<WorkflowRun, ClientError>;

    /// Delete one run. Fails with [`ClientError::NotFound`] if absent.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError>;
}
