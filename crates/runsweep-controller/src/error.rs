//! Pass-level errors.
//!
//! Only failures that leave a pass with nothing to iterate are errors here.
//! Per-run problems are reported as [`crate::RunOutcome`] values instead.

use thiserror::Error;

use runsweep_client::ClientError;

/// Errors that abort a pass.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The initial enumeration failed.
    #[error("failed to list runs in {scope}: {source}")]
    List {
        scope: String,
        #[source]
        source: ClientError,
    },

    /// Fetching the target run failed.
    #[error("failed to get run {run}: {source}")]
    Get {
        run: String,
        #[source]
        source: ClientError,
    },

    /// The target run does not exist.
    #[error("run not found: {0}")]
    RunNotFound(String),
}

/// Human-readable namespace scope for log fields and errors.
pub(crate) fn scope(namespace: &str) -> &str {
    if namespace.is_empty() {
        "all namespaces"
    } else {
        namespace
    }
}
