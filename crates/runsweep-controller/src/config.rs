//! Controller configuration.

use runsweep_core::{JOB_ACTIVITY_PREFIX, TTL_LABEL};

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Label key carrying a run's TTL in seconds.
    pub ttl_label: String,

    /// Task name prefix marking job-activity tasks.
    pub job_activity_prefix: String,

    /// Evaluate runs without deleting them.
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl_label: TTL_LABEL.to_string(),
            job_activity_prefix: JOB_ACTIVITY_PREFIX.to_string(),
            dry_run: false,
        }
    }
}
