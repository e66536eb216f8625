//! Snapshot description template.
//!
//! The description doubles as the `Name` tag and as the ownership marker the
//! pruner keys on, so its shape is fixed: only the prefix is configurable.

use chrono::{DateTime, Utc};

pub const DEFAULT_NAME_PREFIX: &str = "autosnap_";
pub const NAME_TAG: &str = "Name";
pub const DESCRIPTION_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// `<prefix><instance-name>.<volume-id>_<YYYYMMDD_HHMMSS>`
///
/// The timestamp is UTC, not host-local time.
pub fn snapshot_description(
    prefix: &str,
    instance_name: &str,
    volume_id: &str,
    at: DateTime<Utc>,
) -> String {
    format!(
        "{}{}.{}_{}",
        prefix,
        instance_name,
        volume_id,
        at.format(DESCRIPTION_TIMESTAMP_FORMAT)
    )
}
