use autosnap_common::{
    snapshot_description, AutosnapError, Clock, Instance, Result, RetentionPolicy, Snapshot,
    Volume, NAME_TAG,
};
use autosnap_providers::inventory::PageRequest;
use autosnap_providers::{CloudProvider, InstanceMetadata};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

use crate::logger::{self, RunLogger};

pub const DEFAULT_PAGE_SIZE: i32 = 100;
pub const MIN_PAGE_SIZE: i32 = 5;
pub const MAX_PAGE_SIZE: i32 = 1000;
pub const DEFAULT_MAX_PAGES: u32 = 50;

/// Knobs for one run, passed in explicitly by the caller.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub retention: RetentionPolicy,
    pub page_size: i32,
    /// Upper bound on snapshot pages fetched per volume.
    pub max_pages: u32,
    pub dry_run: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            dry_run: false,
        }
    }
}

/// Summary of a successful run. In dry-run mode the counters report what
/// would have been created/deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub instance_id: String,
    pub instance_name: String,
    pub volumes: usize,
    pub snapshots_created: usize,
    pub snapshots_deleted: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(Snapshot),
    /// The provider accepted the request but handed back no snapshot.
    NothingReturned,
    DryRun { description: String },
}

/// job-autosnap: snapshot every volume attached to the current instance, then
/// prune this tool's snapshots that fell out of the retention window.
///
/// Volumes are processed one at a time, creation before pruning. The first
/// error aborts the remaining work and is returned to the caller.
pub struct SnapshotJob<'a> {
    provider: &'a dyn CloudProvider,
    metadata: &'a dyn InstanceMetadata,
    clock: &'a dyn Clock,
    config: &'a JobConfig,
    logger: RunLogger,
}

impl<'a> SnapshotJob<'a> {
    pub fn new(
        provider: &'a dyn CloudProvider,
        metadata: &'a dyn InstanceMetadata,
        clock: &'a dyn Clock,
        config: &'a JobConfig,
    ) -> Self {
        Self {
            provider,
            metadata,
            clock,
            config,
            logger: RunLogger::new(),
        }
    }

    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    pub async fn run(&self) -> Result<RunReport> {
        self.logger.log_event_with_metadata(
            logger::ACTION_RUN,
            logger::STATUS_STARTED,
            "AWS auto snapshot run started.",
            json!({
                "provider": self.provider.name(),
                "retention_days": self.config.retention.retention_days(),
                "name_prefix": self.config.retention.name_prefix(),
                "dry_run": self.config.dry_run,
            }),
        );

        let instance = self.resolve_current_instance().await?;
        let instance_name = instance.display_name().to_string();

        let volumes = self.provider.list_attached_volumes(&instance.id).await?;
        if volumes.is_empty() {
            tracing::info!(
                run_id = %self.logger.run_id(),
                "No volumes attached to {} ({})",
                instance_name,
                instance.id
            );
        }

        let mut report = RunReport {
            run_id: self.logger.run_id(),
            instance_id: instance.id.clone(),
            instance_name: instance_name.clone(),
            volumes: 0,
            snapshots_created: 0,
            snapshots_deleted: 0,
            dry_run: self.config.dry_run,
        };

        for volume in &volumes {
            match self.create_volume_snapshot(&instance_name, volume).await? {
                CreateOutcome::Created(_) | CreateOutcome::DryRun { .. } => {
                    report.snapshots_created += 1
                }
                CreateOutcome::NothingReturned => {}
            }
            report.snapshots_deleted += self.prune_volume_snapshots(volume).await?.len();
            report.volumes += 1;
        }

        self.logger.log_event_with_metadata(
            logger::ACTION_RUN,
            logger::STATUS_SUCCESS,
            "AWS auto snapshot run completed.",
            json!({
                "instance_id": report.instance_id,
                "volumes": report.volumes,
                "snapshots_created": report.snapshots_created,
                "snapshots_deleted": report.snapshots_deleted,
            }),
        );
        Ok(report)
    }

    /// The instance this process runs on, looked up by the id the metadata
    /// service reports.
    pub async fn resolve_current_instance(&self) -> Result<Instance> {
        let instance_id = self
            .metadata
            .instance_id()
            .await
            .map_err(|e| AutosnapError::Metadata(format!("{:#}", e)))?;
        if instance_id.trim().is_empty() {
            return Err(AutosnapError::Metadata(
                "metadata service returned an empty instance id".to_string(),
            ));
        }

        let mut instances = self.provider.describe_instances(&instance_id).await?;
        if instances.is_empty() {
            return Err(AutosnapError::InstanceNotFound { instance_id });
        }
        if instances.len() > 1 {
            tracing::warn!(
                "{} directory entries match instance id {}, using the first",
                instances.len(),
                instance_id
            );
        }
        let instance = instances.swap_remove(0);

        self.logger.log_event(
            logger::ACTION_RESOLVE_INSTANCE,
            logger::STATUS_SUCCESS,
            &format!("Running on {} ({}).", instance.display_name(), instance.id),
        );
        Ok(instance)
    }

    pub async fn create_volume_snapshot(
        &self,
        instance_name: &str,
        volume: &Volume,
    ) -> Result<CreateOutcome> {
        let description = snapshot_description(
            self.config.retention.name_prefix(),
            instance_name,
            &volume.id,
            self.clock.now(),
        );

        if self.config.dry_run {
            self.logger.log_event(
                logger::ACTION_SNAPSHOT_CREATE,
                logger::STATUS_DRY_RUN,
                &format!(
                    "Would create snapshot {} for {}.{}.",
                    description, instance_name, volume.id
                ),
            );
            return Ok(CreateOutcome::DryRun { description });
        }

        let Some(snapshot) = self
            .provider
            .create_snapshot(&volume.id, &description)
            .await?
        else {
            // Provider contract unverified: an accepted request without a
            // snapshot is passed through silently.
            tracing::debug!(
                run_id = %self.logger.run_id(),
                "Provider returned no snapshot for {}, not tagging",
                description
            );
            return Ok(CreateOutcome::NothingReturned);
        };

        self.provider
            .create_tags(&snapshot.id, &[(NAME_TAG.to_string(), description.clone())])
            .await?;

        self.logger.log_event_with_metadata(
            logger::ACTION_SNAPSHOT_CREATE,
            logger::STATUS_SUCCESS,
            &format!(
                "Created snapshot {} for {}.{}.",
                snapshot.id, instance_name, volume.id
            ),
            json!({
                "snapshot_id": snapshot.id,
                "volume_id": volume.id,
                "description": description,
            }),
        );
        Ok(CreateOutcome::Created(snapshot))
    }

    /// Deletes (or, in dry-run mode, reports) every snapshot of `volume` the
    /// retention policy marks as prunable. Returns those snapshots.
    pub async fn prune_volume_snapshots(&self, volume: &Volume) -> Result<Vec<Snapshot>> {
        // Listing finishes before the first delete so the paging cursor is
        // never invalidated mid-scan.
        let snapshots = self.collect_snapshots(&volume.id).await?;
        let now = self.clock.now();
        let expired: Vec<Snapshot> = snapshots
            .into_iter()
            .filter(|s| self.config.retention.should_prune(s, now))
            .collect();

        for snapshot in &expired {
            if self.config.dry_run {
                self.logger.log_event(
                    logger::ACTION_SNAPSHOT_DELETE,
                    logger::STATUS_DRY_RUN,
                    &format!(
                        "Would delete snapshot {} created at {}.",
                        snapshot.id, snapshot.start_time
                    ),
                );
                continue;
            }

            self.provider.delete_snapshot(&snapshot.id).await?;
            self.logger.log_event(
                logger::ACTION_SNAPSHOT_DELETE,
                logger::STATUS_SUCCESS,
                &format!(
                    "Deleted snapshot {} created at {}.",
                    snapshot.id, snapshot.start_time
                ),
            );
        }

        Ok(expired)
    }

    async fn collect_snapshots(&self, volume_id: &str) -> Result<Vec<Snapshot>> {
        let mut all = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut next_token: Option<String> = None;

        for _ in 0..self.config.max_pages {
            let page = self
                .provider
                .list_snapshots(
                    volume_id,
                    PageRequest {
                        page_size: self.config.page_size,
                        next_token: next_token.take(),
                    },
                )
                .await?;
            all.extend(page.snapshots);

            match page.next_token.filter(|t| !t.is_empty()) {
                None => return Ok(all),
                Some(token) if !seen_tokens.insert(token.clone()) => {
                    tracing::warn!(
                        run_id = %self.logger.run_id(),
                        "Provider repeated page token for {}, stopping after {} snapshot(s)",
                        volume_id,
                        all.len()
                    );
                    return Ok(all);
                }
                Some(token) => next_token = Some(token),
            }
        }

        tracing::warn!(
            run_id = %self.logger.run_id(),
            "Snapshot listing for {} hit the {}-page limit, pruning {} snapshot(s) seen so far",
            volume_id,
            self.config.max_pages,
            all.len()
        );
        Ok(all)
    }
}
