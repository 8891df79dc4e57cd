//! Core domain errors.

use thiserror::Error;

/// Core domain errors for runsweep.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// TTL label value is not a base-10 integer.
    #[error("TTL value {value:?} is not a base-10 integer: {reason}")]
    MalformedTtl { value: String, reason: String },

    /// TTL label value is a negative number of seconds.
    #[error("TTL value {0} is negative")]
    NegativeTtl(i64),
}
