use std::fmt::Display;
use uuid::Uuid;

pub const ACTION_RUN: &str = "RUN";
pub const ACTION_RESOLVE_INSTANCE: &str = "RESOLVE_INSTANCE";
pub const ACTION_SNAPSHOT_CREATE: &str = "SNAPSHOT_CREATE";
pub const ACTION_SNAPSHOT_DELETE: &str = "SNAPSHOT_DELETE";

pub const STATUS_STARTED: &str = "started";
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_DRY_RUN: &str = "dry_run";
pub const STATUS_FAILED: &str = "failed";

/// Action logger for one snapshot run.
///
/// Every line carries the run id so all lines of a run can be correlated in
/// the system journal.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: Uuid,
}

impl RunLogger {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn log_event(&self, action_type: &str, status: &str, message: &str) {
        tracing::info!(
            run_id = %self.run_id,
            action_type,
            status,
            "{}",
            message
        );
    }

    /// Log event with metadata (context info)
    pub fn log_event_with_metadata(
        &self,
        action_type: &str,
        status: &str,
        message: &str,
        metadata: serde_json::Value,
    ) {
        tracing::info!(
            run_id = %self.run_id,
            action_type,
            status,
            metadata = %metadata,
            "{}",
            message
        );
    }

    pub fn log_error(&self, action_type: &str, error: &dyn Display) {
        tracing::error!(
            run_id = %self.run_id,
            action_type,
            status = STATUS_FAILED,
            "{}",
            error
        );
    }
}

impl Default for RunLogger {
    fn default() -> Self {
        Self::new()
    }
}
