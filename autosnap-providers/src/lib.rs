use anyhow::Result;
use async_trait::async_trait;
use autosnap_common::{Instance, Snapshot, Volume};

pub mod metadata;

pub use metadata::{ImdsClient, StaticInstanceId};

/// Block-storage provider operations used by a snapshot run.
///
/// Every call maps to one provider API operation. Implementations do not
/// retry; failures surface to the caller as-is.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Short provider code for logs ("ec2", "mock").
    fn name(&self) -> &'static str;

    /// Instance directory lookup filtered by id. An unknown id yields an empty list.
    async fn describe_instances(&self, instance_id: &str) -> Result<Vec<Instance>>;

    /// Volumes currently attached to `instance_id`. May be empty.
    async fn list_attached_volumes(&self, instance_id: &str) -> Result<Vec<Volume>>;

    /// Request a new snapshot of `volume_id`.
    ///
    /// `Ok(None)` means the provider accepted the call but returned no snapshot;
    /// callers tolerate it rather than treating it as an error.
    async fn create_snapshot(&self, volume_id: &str, description: &str)
        -> Result<Option<Snapshot>>;

    async fn create_tags(&self, resource_id: &str, tags: &[(String, String)]) -> Result<()>;

    /// One page of snapshots whose source volume is `volume_id`.
    async fn list_snapshots(
        &self,
        volume_id: &str,
        page: inventory::PageRequest,
    ) -> Result<inventory::SnapshotPage>;

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;
}

/// Where the process learns which instance it runs on.
#[async_trait]
pub trait InstanceMetadata: Send + Sync {
    async fn instance_id(&self) -> Result<String>;
}

pub mod inventory {
    use autosnap_common::Snapshot;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct PageRequest {
        pub page_size: i32,
        pub next_token: Option<String>,
    }

    impl PageRequest {
        pub fn first(page_size: i32) -> Self {
            Self {
                page_size,
                next_token: None,
            }
        }
    }

    #[derive(Clone, Debug, Default)]
    pub struct SnapshotPage {
        pub snapshots: Vec<Snapshot>,
        /// Continuation token; `None` (or empty) ends the listing.
        pub next_token: Option<String>,
    }
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "ec2")]
pub mod ec2;
