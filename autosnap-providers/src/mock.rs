use crate::{inventory, CloudProvider};
use anyhow::Result;
use async_trait::async_trait;
use autosnap_common::{Clock, Instance, Snapshot, SystemClock, Volume};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Seed data for the in-memory provider (JSON file or built in tests).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MockFixture {
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub volumes: Vec<MockVolume>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

impl MockFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read mock fixture {}: {}", path.display(), e))?;
        let fixture = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid mock fixture {}: {}", path.display(), e))?;
        Ok(fixture)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MockVolume {
    #[serde(flatten)]
    pub volume: Volume,
    #[serde(default)]
    pub attached_to: Option<String>,
}

/// Every provider call the mock has served, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    DescribeInstances(String),
    ListAttachedVolumes(String),
    CreateSnapshot {
        volume_id: String,
        description: String,
    },
    CreateTags {
        resource_id: String,
        tags: Vec<(String, String)>,
    },
    ListSnapshots {
        volume_id: String,
        next_token: Option<String>,
    },
    DeleteSnapshot(String),
}

#[derive(Default)]
struct MockState {
    instances: Vec<Instance>,
    volumes: Vec<MockVolume>,
    snapshots: Vec<Snapshot>,
    calls: Vec<MockCall>,
    next_seq: u64,
}

#[derive(Default)]
struct MockBehavior {
    create_returns_nothing: bool,
    endless_pagination: bool,
    failing_deletes: HashSet<String>,
}

/// In-memory provider for local runs and tests.
pub struct MockProvider {
    state: Mutex<MockState>,
    behavior: MockBehavior,
    clock: Arc<dyn Clock>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::from_fixture(MockFixture::default())
    }

    pub fn from_fixture(fixture: MockFixture) -> Self {
        Self {
            state: Mutex::new(MockState {
                instances: fixture.instances,
                volumes: fixture.volumes,
                snapshots: fixture.snapshots,
                ..MockState::default()
            }),
            behavior: MockBehavior::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock stamped onto snapshots created through this provider.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_instance(self, instance: Instance) -> Self {
        self.lock().instances.push(instance);
        self
    }

    pub fn with_volume(self, instance_id: &str, volume: Volume) -> Self {
        self.lock().volumes.push(MockVolume {
            volume,
            attached_to: Some(instance_id.to_string()),
        });
        self
    }

    pub fn with_snapshot(self, snapshot: Snapshot) -> Self {
        self.lock().snapshots.push(snapshot);
        self
    }

    /// Creation calls succeed but hand back no snapshot.
    pub fn create_returns_nothing(mut self) -> Self {
        self.behavior.create_returns_nothing = true;
        self
    }

    /// Every snapshot page carries a fresh continuation token, forever.
    pub fn endless_pagination(mut self) -> Self {
        self.behavior.endless_pagination = true;
        self
    }

    pub fn fail_delete(mut self, snapshot_id: &str) -> Self {
        self.behavior.failing_deletes.insert(snapshot_id.to_string());
        self
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.lock().snapshots.clone()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn describe_instances(&self, instance_id: &str) -> Result<Vec<Instance>> {
        let mut state = self.lock();
        state
            .calls
            .push(MockCall::DescribeInstances(instance_id.to_string()));
        Ok(state
            .instances
            .iter()
            .filter(|i| i.id == instance_id)
            .cloned()
            .collect())
    }

    async fn list_attached_volumes(&self, instance_id: &str) -> Result<Vec<Volume>> {
        let mut state = self.lock();
        state
            .calls
            .push(MockCall::ListAttachedVolumes(instance_id.to_string()));
        Ok(state
            .volumes
            .iter()
            .filter(|v| v.attached_to.as_deref() == Some(instance_id))
            .map(|v| v.volume.clone())
            .collect())
    }

    async fn create_snapshot(
        &self,
        volume_id: &str,
        description: &str,
    ) -> Result<Option<Snapshot>> {
        let now = self.clock.now();
        let mut state = self.lock();
        state.calls.push(MockCall::CreateSnapshot {
            volume_id: volume_id.to_string(),
            description: description.to_string(),
        });
        if !state.volumes.iter().any(|v| v.volume.id == volume_id) {
            return Err(anyhow::anyhow!(
                "InvalidVolume.NotFound: The volume '{}' does not exist.",
                volume_id
            ));
        }
        if self.behavior.create_returns_nothing {
            return Ok(None);
        }

        state.next_seq += 1;
        let snapshot = Snapshot {
            id: format!("snap-mock{:08x}", state.next_seq),
            volume_id: Some(volume_id.to_string()),
            description: description.to_string(),
            start_time: now,
            tags: BTreeMap::new(),
        };
        state.snapshots.push(snapshot.clone());
        Ok(Some(snapshot))
    }

    async fn create_tags(&self, resource_id: &str, tags: &[(String, String)]) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::CreateTags {
            resource_id: resource_id.to_string(),
            tags: tags.to_vec(),
        });
        let snapshot = state
            .snapshots
            .iter_mut()
            .find(|s| s.id == resource_id)
            .ok_or_else(|| {
                anyhow::anyhow!("InvalidID: The ID '{}' is not valid", resource_id)
            })?;
        for (key, value) in tags {
            snapshot.tags.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn list_snapshots(
        &self,
        volume_id: &str,
        page: inventory::PageRequest,
    ) -> Result<inventory::SnapshotPage> {
        let mut state = self.lock();
        state.calls.push(MockCall::ListSnapshots {
            volume_id: volume_id.to_string(),
            next_token: page.next_token.clone(),
        });

        let offset = match page.next_token.as_deref() {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("InvalidParameterValue: bad NextToken '{}'", token))?,
            None => 0,
        };
        let page_size = usize::try_from(page.page_size.max(1)).unwrap_or(1);

        let matching: Vec<Snapshot> = state
            .snapshots
            .iter()
            .filter(|s| s.volume_id.as_deref() == Some(volume_id))
            .cloned()
            .collect();
        let end = (offset + page_size).min(matching.len());
        let snapshots = matching
            .get(offset..end)
            .map(|s| s.to_vec())
            .unwrap_or_default();

        let next = offset + page_size;
        let next_token = if self.behavior.endless_pagination || next < matching.len() {
            Some(next.to_string())
        } else {
            None
        };

        Ok(inventory::SnapshotPage {
            snapshots,
            next_token,
        })
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        let mut state = self.lock();
        state
            .calls
            .push(MockCall::DeleteSnapshot(snapshot_id.to_string()));
        if self.behavior.failing_deletes.contains(snapshot_id) {
            return Err(anyhow::anyhow!(
                "UnauthorizedOperation: You are not authorized to delete snapshot '{}'",
                snapshot_id
            ));
        }
        let before = state.snapshots.len();
        state.snapshots.retain(|s| s.id != snapshot_id);
        if state.snapshots.len() == before {
            return Err(anyhow::anyhow!(
                "InvalidSnapshot.NotFound: The snapshot '{}' does not exist.",
                snapshot_id
            ));
        }
        Ok(())
    }
}
