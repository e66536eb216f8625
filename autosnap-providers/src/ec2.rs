use crate::{inventory, CloudProvider};
use anyhow::Result;
use async_trait::async_trait;
use autosnap_common::{Instance, Snapshot, Volume};
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::primitives::DateTime as SdkDateTime;
use aws_sdk_ec2::types::{Filter, Tag};
use aws_sdk_ec2::Client;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

const VOLUME_PAGE_SIZE: i32 = 100;
const MAX_VOLUME_PAGES: usize = 50;

/// AWS EC2 / EBS backend.
///
/// Credentials and region come from the SDK's default provider chain
/// (environment, shared profile files, instance role).
pub struct Ec2Provider {
    client: Client,
}

impl Ec2Provider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_sdk_ec2::config::Region::new(region));
        }
        let config = loader.load().await;
        Self::new(Client::new(&config))
    }
}

fn sdk_error<E>(operation: &str, err: E) -> anyhow::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    anyhow::anyhow!("EC2 {} failed: {}", operation, DisplayErrorContext(&err))
}

fn to_utc(t: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())
}

fn tags_from_sdk(tags: &[Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|t| {
            let key = t.key()?;
            Some((key.to_string(), t.value().unwrap_or_default().to_string()))
        })
        .collect()
}

fn volume_from_sdk(v: &aws_sdk_ec2::types::Volume, instance_id: &str) -> Option<Volume> {
    let id = v.volume_id()?;
    let device = v
        .attachments()
        .iter()
        .find(|a| a.instance_id() == Some(instance_id))
        .and_then(|a| a.device())
        .map(str::to_string);
    Some(Volume {
        id: id.to_string(),
        size_gb: v.size(),
        availability_zone: v.availability_zone().map(str::to_string),
        device,
    })
}

fn snapshot_from_sdk(s: &aws_sdk_ec2::types::Snapshot) -> Option<Snapshot> {
    let id = s.snapshot_id()?;
    let Some(start_time) = s.start_time().and_then(to_utc) else {
        // Age unknown: never a pruning candidate.
        tracing::warn!("Snapshot {} has no usable start time, skipping", id);
        return None;
    };
    Some(Snapshot {
        id: id.to_string(),
        volume_id: s.volume_id().map(str::to_string),
        description: s.description().unwrap_or_default().to_string(),
        start_time,
        tags: tags_from_sdk(s.tags()),
    })
}

#[async_trait]
impl CloudProvider for Ec2Provider {
    fn name(&self) -> &'static str {
        "ec2"
    }

    async fn describe_instances(&self, instance_id: &str) -> Result<Vec<Instance>> {
        let resp = self
            .client
            .describe_instances()
            .filters(
                Filter::builder()
                    .name("instance-id")
                    .values(instance_id)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| sdk_error("DescribeInstances", e))?;

        Ok(resp
            .reservations()
            .iter()
            .flat_map(|r| r.instances().iter())
            .filter_map(|i| {
                let id = i.instance_id()?;
                Some(Instance {
                    id: id.to_string(),
                    tags: tags_from_sdk(i.tags()),
                })
            })
            .collect())
    }

    async fn list_attached_volumes(&self, instance_id: &str) -> Result<Vec<Volume>> {
        let mut volumes = Vec::new();
        let mut next_token: Option<String> = None;

        for _ in 0..MAX_VOLUME_PAGES {
            let resp = self
                .client
                .describe_volumes()
                .filters(
                    Filter::builder()
                        .name("attachment.instance-id")
                        .values(instance_id)
                        .build(),
                )
                .max_results(VOLUME_PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| sdk_error("DescribeVolumes", e))?;

            volumes.extend(
                resp.volumes()
                    .iter()
                    .filter_map(|v| volume_from_sdk(v, instance_id)),
            );

            match resp.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => return Ok(volumes),
            }
        }

        tracing::warn!(
            "DescribeVolumes for {} still paginating after {} pages, using {} volume(s) seen so far",
            instance_id,
            MAX_VOLUME_PAGES,
            volumes.len()
        );
        Ok(volumes)
    }

    async fn create_snapshot(
        &self,
        volume_id: &str,
        description: &str,
    ) -> Result<Option<Snapshot>> {
        let resp = self
            .client
            .create_snapshot()
            .volume_id(volume_id)
            .description(description)
            .send()
            .await
            .map_err(|e| sdk_error("CreateSnapshot", e))?;

        let Some(snapshot_id) = resp.snapshot_id() else {
            return Ok(None);
        };
        Ok(Some(Snapshot {
            id: snapshot_id.to_string(),
            volume_id: Some(resp.volume_id().unwrap_or(volume_id).to_string()),
            description: resp.description().unwrap_or(description).to_string(),
            start_time: resp.start_time().and_then(to_utc).unwrap_or_else(Utc::now),
            tags: tags_from_sdk(resp.tags()),
        }))
    }

    async fn create_tags(&self, resource_id: &str, tags: &[(String, String)]) -> Result<()> {
        let mut req = self.client.create_tags().resources(resource_id);
        for (key, value) in tags {
            req = req.tags(Tag::builder().key(key).value(value).build());
        }
        req.send().await.map_err(|e| sdk_error("CreateTags", e))?;
        Ok(())
    }

    async fn list_snapshots(
        &self,
        volume_id: &str,
        page: inventory::PageRequest,
    ) -> Result<inventory::SnapshotPage> {
        let resp = self
            .client
            .describe_snapshots()
            .owner_ids("self")
            .filters(
                Filter::builder()
                    .name("volume-id")
                    .values(volume_id)
                    .build(),
            )
            .max_results(page.page_size)
            .set_next_token(page.next_token)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeSnapshots", e))?;

        Ok(inventory::SnapshotPage {
            snapshots: resp.snapshots().iter().filter_map(snapshot_from_sdk).collect(),
            next_token: resp.next_token().map(str::to_string),
        })
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.client
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteSnapshot", e))?;
        Ok(())
    }
}
