//! Identity of a workflow run within the cluster.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::run::WorkflowRun;

/// Namespaced name of a workflow run.
///
/// Both parts are immutable once the resource is created, so a `RunRef`
/// taken at list time still addresses the same resource at delete time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunRef {
    /// Namespace the run lives in.
    pub namespace: String,

    /// Name of the run.
    pub name: String,
}

impl RunRef {
    /// Create a new RunRef.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RunRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl From<&WorkflowRun> for RunRef {
    fn from(run: &WorkflowRun) -> Self {
        Self::new(&run.metadata.namespace, &run.metadata.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ref_display() {
        let id = RunRef::new("ci", "build-42");
        assert_eq!(format!("{}", id), "ci/build-42");
    }

    #[test]
    fn test_run_ref_from_run() {
        let run = WorkflowRun::new("ci", "build-42");
        assert_eq!(RunRef::from(&run), RunRef::new("ci", "build-42"));
    }
}
