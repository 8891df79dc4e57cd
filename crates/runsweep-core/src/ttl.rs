//! Label-encoded time-to-live.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// Label key carrying a run's TTL in seconds.
pub const TTL_LABEL: &str = "tekton.dev/ttl";

/// Retention period of a finished run, parsed from its TTL label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ttl(Duration);

impl Ttl {
    /// Create a TTL of the given number of seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// TTL in whole seconds.
    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }

    /// Read the TTL from a run's labels.
    pub fn from_labels(labels: &BTreeMap<String, String>, key: &str) -> Result<Self, SkipReason> {
        let value = labels.get(key).ok_or_else(|| SkipReason::MissingTtl {
            label: key.to_string(),
        })?;
        value.parse().map_err(SkipReason::InvalidTtl)
    }

    /// Returns true once strictly more than the TTL has elapsed between
    /// `completed_at` and `now`.
    ///
    /// A completion time in the future never expires.
    pub fn is_expired(&self, completed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let Some(ttl) = i64::try_from(self.as_secs())
            .ok()
            .and_then(TimeDelta::try_seconds)
        else {
            return false;
        };
        now.signed_duration_since(completed_at) > ttl
    }

    /// Earliest instant after which the run is expired, if representable.
    pub fn expires_at(&self, completed_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let ttl = TimeDelta::try_seconds(i64::try_from(self.as_secs()).ok()?)?;
        completed_at.checked_add_signed(ttl)
    }
}

impl FromStr for Ttl {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs: i64 = s.parse().map_err(|e: std::num::ParseIntError| CoreError::MalformedTtl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        let secs = u64::try_from(secs).map_err(|_| CoreError::NegativeTtl(secs))?;
        Ok(Self::from_secs(secs))
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

/// Why a labelled run was passed over without evaluating its TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The TTL label is absent.
    MissingTtl { label: String },

    /// The TTL label is present but unusable.
    InvalidTtl(CoreError),

    /// The run looks finished but carries no completion time.
    MissingCompletionTime,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTtl { label } => write!(f, "label {label} is missing"),
            Self::InvalidTtl(e) => write!(f, "{e}"),
            Self::MissingCompletionTime => f.write_str("finished run has no completion time"),
        }
    }
}
