use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod clock;
pub mod error;
pub mod naming;
pub mod retention;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AutosnapError, Result};
pub use naming::{snapshot_description, DEFAULT_NAME_PREFIX, NAME_TAG};
pub use retention::RetentionPolicy;

// --- Entities (provider-owned, read-only here) ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Instance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Human-readable name used in snapshot descriptions.
    ///
    /// The `Name` tag wins when it carries a non-blank value; otherwise the raw
    /// instance id is used so descriptions never end up with an empty segment.
    pub fn display_name(&self) -> &str {
        self.tags
            .get(NAME_TAG)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(self.id.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub size_gb: Option<i32>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
}

impl Volume {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            size_gb: None,
            availability_zone: None,
            device: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: String,
    #[serde(default)]
    pub volume_id: Option<String>,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}
