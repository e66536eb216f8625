// Integration tests for the snapshot job (resolve -> enumerate -> create -> prune).

mod common;

use async_trait::async_trait;
use autosnap_common::{AutosnapError, Instance, RetentionPolicy, Volume, NAME_TAG};
use autosnap_orchestrator::snapshot_job::{CreateOutcome, JobConfig, SnapshotJob};
use autosnap_providers::mock::{MockCall, MockProvider};
use autosnap_providers::{InstanceMetadata, StaticInstanceId};
use chrono::Duration;
use common::{at, clock, now, snapshot, web1_provider, INSTANCE_ID, VOLUME_ID};

fn deletes(provider: &MockProvider) -> Vec<String> {
    provider
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MockCall::DeleteSnapshot(id) => Some(id),
            _ => None,
        })
        .collect()
}

fn creates(provider: &MockProvider) -> usize {
    provider
        .calls()
        .iter()
        .filter(|c| matches!(c, MockCall::CreateSnapshot { .. }))
        .count()
}

#[tokio::test]
async fn scenario_a_creates_and_tags_one_snapshot() {
    let provider = web1_provider(now());
    let metadata = StaticInstanceId::new(INSTANCE_ID);
    let clock = clock(at(2017, 1, 10, 8, 30, 15));
    let config = JobConfig::default();

    let report = SnapshotJob::new(&provider, &metadata, &clock, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.instance_id, INSTANCE_ID);
    assert_eq!(report.instance_name, "web-1");
    assert_eq!(report.volumes, 1);
    assert_eq!(report.snapshots_created, 1);
    assert_eq!(report.snapshots_deleted, 0);

    let expected = "autosnap_web-1.vol-111_20170110_083015";
    let snapshots = provider.snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].description, expected);
    assert_eq!(snapshots[0].tags.get(NAME_TAG).map(String::as_str), Some(expected));
}

#[tokio::test]
async fn scenario_b_prunes_expired_autosnap_snapshot() {
    let provider = web1_provider(now()).with_snapshot(snapshot(
        "snap-old",
        VOLUME_ID,
        "autosnap_web-1.vol-111_20170101_000000",
        at(2017, 1, 1, 0, 0, 0),
    ));
    let metadata = StaticInstanceId::new(INSTANCE_ID);
    let clock = clock(now());
    let config = JobConfig::default();

    let report = SnapshotJob::new(&provider, &metadata, &clock, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.snapshots_deleted, 1);
    assert_eq!(deletes(&provider), vec!["snap-old".to_string()]);
    // The snapshot made earlier in this run survives its own prune pass.
    let remaining = provider.snapshots();
    assert_eq!(remaining.len(), 1);
    assert_ne!(remaining[0].id, "snap-old");
}

#[tokio::test]
async fn scenario_c_foreign_snapshot_is_retained() {
    let provider = web1_provider(now()).with_snapshot(snapshot(
        "snap-manual",
        VOLUME_ID,
        "manual-backup-jan",
        at(2017, 1, 1, 0, 0, 0),
    ));
    let metadata = StaticInstanceId::new(INSTANCE_ID);
    let clock = clock(now());
    let config = JobConfig::default();

    let report = SnapshotJob::new(&provider, &metadata, &clock, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.snapshots_deleted, 0);
    assert!(deletes(&provider).is_empty());
    assert!(provider.snapshots().iter().any(|s| s.id == "snap-manual"));
}

#[tokio::test]
async fn scenario_d_unknown_instance_aborts_before_any_action() {
    let provider = web1_provider(now()).with_snapshot(snapshot(
        "snap-old",
        VOLUME_ID,
        "autosnap_web-1.vol-111_20170101_000000",
        at(2017, 1, 1, 0, 0, 0),
    ));
    let metadata = StaticInstanceId::new("i-0ghost");
    let clock = clock(now());
    let config = JobConfig::default();

    let err = SnapshotJob::new(&provider, &metadata, &clock, &config)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, AutosnapError::InstanceNotFound { .. }));
    assert_eq!(err.to_string(), "Instance not found for ID: i-0ghost.");
    assert_eq!(
        provider.calls(),
        vec![MockCall::DescribeInstances("i-0ghost".to_string())]
    );
}

#[tokio::test]
async fn display_name_falls_back_to_instance_id() {
    let provider = MockProvider::new()
        .with_instance(Instance::new("i-0noname").with_tag("Env", "prod"))
        .with_volume("i-0noname", Volume::new("vol-222"));
    let metadata = StaticInstanceId::new("i-0noname");
    let clock = clock(at(2017, 1, 10, 0, 0, 0));
    let config = JobConfig::default();

    let report = SnapshotJob::new(&provider, &metadata, &clock, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.instance_name, "i-0noname");
    assert_eq!(
        provider.snapshots()[0].description,
        "autosnap_i-0noname.vol-222_20170110_000000"
    );
}

#[tokio::test]
async fn retention_boundary_is_exclusive() {
    let created = at(2017, 1, 1, 0, 0, 0);
    let description = "autosnap_web-1.vol-111_20170101_000000";
    let metadata = StaticInstanceId::new(INSTANCE_ID);
    let config = JobConfig::default();
    let volume = Volume::new(VOLUME_ID);

    let exactly = created + Duration::days(7);
    let provider = web1_provider(exactly).with_snapshot(snapshot("snap-edge", VOLUME_ID, description, created));
    let clock_exact = clock(exactly);
    let job = SnapshotJob::new(&provider, &metadata, &clock_exact, &config);
    assert!(job.prune_volume_snapshots(&volume).await.unwrap().is_empty());

    let clock_over = clock(exactly + Duration::seconds(1));
    let job = SnapshotJob::new(&provider, &metadata, &clock_over, &config);
    let pruned = job.prune_volume_snapshots(&volume).await.unwrap();
    assert_eq!(pruned.len(), 1);
    assert_eq!(pruned[0].id, "snap-edge");
}

#[tokio::test]
async fn second_prune_pass_is_a_no_op() {
    let mut provider = web1_provider(now());
    for n in 0..7 {
        provider = provider.with_snapshot(snapshot(
            &format!("snap-{}", n),
            VOLUME_ID,
            "autosnap_web-1.vol-111_20161201_000000",
            at(2016, 12, 1, n, 0, 0),
        ));
    }
    let metadata = StaticInstanceId::new(INSTANCE_ID);
    let clock = clock(now());
    let config = JobConfig {
        page_size: 5,
        ..JobConfig::default()
    };
    let job = SnapshotJob::new(&provider, &metadata, &clock, &config);
    let volume = Volume::new(VOLUME_ID);

    assert_eq!(job.prune_volume_snapshots(&volume).await.unwrap().len(), 7);
    assert!(job.prune_volume_snapshots(&volume).await.unwrap().is_empty());
    assert!(provider.snapshots().is_empty());
}

#[tokio::test]
async fn custom_prefix_controls_ownership() {
    let provider = web1_provider(now())
        .with_snapshot(snapshot(
            "snap-default",
            VOLUME_ID,
            "autosnap_web-1.vol-111_20170101_000000",
            at(2017, 1, 1, 0, 0, 0),
        ))
        .with_snapshot(snapshot(
            "snap-nightly",
            VOLUME_ID,
            "nightly_web-1.vol-111_20170101_000000",
            at(2017, 1, 1, 0, 0, 0),
        ));
    let metadata = StaticInstanceId::new(INSTANCE_ID);
    let clock = clock(now());
    let config = JobConfig {
        retention: RetentionPolicy::new(3, "nightly_").unwrap(),
        ..JobConfig::default()
    };

    let report = SnapshotJob::new(&provider, &metadata, &clock, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(deletes(&provider), vec!["snap-nightly".to_string()]);
    assert_eq!(report.snapshots_deleted, 1);
    assert!(provider
        .snapshots()
        .iter()
        .any(|s| s.description == "nightly_web-1.vol-111_20170110_000000"));
}

#[tokio::test]
async fn endless_pagination_still_terminates() {
    let provider = web1_provider(now()).endless_pagination();
    let metadata = StaticInstanceId::new(INSTANCE_ID);
    let clock = clock(now());
    let config = JobConfig {
        max_pages: 4,
        ..JobConfig::default()
    };

    let report = SnapshotJob::new(&provider, &metadata, &clock, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.volumes, 1);
    let listings = provider
        .calls()
        .iter()
        .filter(|c| matches!(c, MockCall::ListSnapshots { .. }))
        .count();
    assert_eq!(listings, 4);
}

#[tokio::test]
async fn failing_delete_aborts_remaining_volumes() {
    let provider = web1_provider(now())
        .with_volume(INSTANCE_ID, Volume::new("vol-222"))
        .with_snapshot(snapshot(
            "snap-locked",
            VOLUME_ID,
            "autosnap_web-1.vol-111_20170101_000000",
            at(2017, 1, 1, 0, 0, 0),
        ))
        .fail_delete("snap-locked");
    let metadata = StaticInstanceId::new(INSTANCE_ID);
    let clock = clock(now());
    let config = JobConfig::default();

    let err = SnapshotJob::new(&provider, &metadata, &clock, &config)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, AutosnapError::Provider(_)));
    assert!(err.to_string().contains("UnauthorizedOperation"));
    // vol-222 was never reached.
    assert_eq!(creates(&provider), 1);
    assert!(!provider.calls().iter().any(|c| matches!(
        c,
        MockCall::CreateSnapshot { volume_id, .. } if volume_id == "vol-222"
    )));
}

#[tokio::test]
async fn creation_returning_nothing_is_tolerated() {
    let provider = web1_provider(now())
        .create_returns_nothing()
        .with_snapshot(snapshot(
            "snap-old",
            VOLUME_ID,
            "autosnap_web-1.vol-111_20170101_000000",
            at(2017, 1, 1, 0, 0, 0),
        ));
    let metadata = StaticInstanceId::new(INSTANCE_ID);
    let clock = clock(now());
    let config = JobConfig::default();
    let job = SnapshotJob::new(&provider, &metadata, &clock, &config);

    let outcome = job
        .create_volume_snapshot("web-1", &Volume::new(VOLUME_ID))
        .await
        .unwrap();
    assert_eq!(outcome, CreateOutcome::NothingReturned);

    let report = job.run().await.unwrap();
    assert_eq!(report.snapshots_created, 0);
    assert_eq!(report.snapshots_deleted, 1);
    assert!(!provider
        .calls()
        .iter()
        .any(|c| matches!(c, MockCall::CreateTags { .. })));
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let provider = web1_provider(now()).with_snapshot(snapshot(
        "snap-old",
        VOLUME_ID,
        "autosnap_web-1.vol-111_20170101_000000",
        at(2017, 1, 1, 0, 0, 0),
    ));
    let metadata = StaticInstanceId::new(INSTANCE_ID);
    let clock = clock(now());
    let config = JobConfig {
        dry_run: true,
        ..JobConfig::default()
    };

    let report = SnapshotJob::new(&provider, &metadata, &clock, &config)
        .run()
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.snapshots_created, 1);
    assert_eq!(report.snapshots_deleted, 1);
    assert_eq!(creates(&provider), 0);
    assert!(deletes(&provider).is_empty());
    assert_eq!(provider.snapshots().len(), 1);
}

#[tokio::test]
async fn instance_without_volumes_completes() {
    let provider = MockProvider::new().with_instance(Instance::new("i-0bare"));
    let metadata = StaticInstanceId::new("i-0bare");
    let clock = clock(now());
    let config = JobConfig::default();

    let report = SnapshotJob::new(&provider, &metadata, &clock, &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.volumes, 0);
    assert_eq!(report.snapshots_created, 0);
}

struct UnreachableMetadata;

#[async_trait]
impl InstanceMetadata for UnreachableMetadata {
    async fn instance_id(&self) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

#[tokio::test]
async fn metadata_failures_are_reported_as_metadata_errors() {
    let provider = web1_provider(now());
    let clock = clock(now());
    let config = JobConfig::default();

    let err = SnapshotJob::new(&provider, &UnreachableMetadata, &clock, &config)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, AutosnapError::Metadata(_)));
    assert!(provider.calls().is_empty());

    let blank = StaticInstanceId::new("  ");
    let err = SnapshotJob::new(&provider, &blank, &clock, &config)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, AutosnapError::Metadata(_)));
}
