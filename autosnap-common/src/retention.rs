use chrono::{DateTime, Duration, Utc};

use crate::error::{AutosnapError, Result};
use crate::naming::DEFAULT_NAME_PREFIX;
use crate::Snapshot;

pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Which snapshots the pruner may delete.
///
/// A snapshot is prunable only when both hold:
/// - its description starts with `name_prefix` (it was made by this tool)
/// - its age is strictly greater than `retention_days`
///
/// All ages are computed in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    retention_days: u32,
    name_prefix: String,
}

impl RetentionPolicy {
    pub fn new(retention_days: u32, name_prefix: impl Into<String>) -> Result<Self> {
        let name_prefix = name_prefix.into();
        if retention_days == 0 {
            return Err(AutosnapError::Config(
                "retention window must be at least one day".to_string(),
            ));
        }
        if name_prefix.trim().is_empty() {
            // An empty prefix would match every snapshot on the volume.
            return Err(AutosnapError::Config(
                "snapshot name prefix must not be empty".to_string(),
            ));
        }
        Ok(Self {
            retention_days,
            name_prefix,
        })
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub fn window(&self) -> Duration {
        Duration::days(i64::from(self.retention_days))
    }

    pub fn owns(&self, description: &str) -> bool {
        description.starts_with(&self.name_prefix)
    }

    pub fn is_expired(&self, start_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(start_time) > self.window()
    }

    pub fn should_prune(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> bool {
        self.owns(&snapshot.description) && self.is_expired(snapshot.start_time, now)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }
}
