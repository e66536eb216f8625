// Shared fixtures for snapshot job tests. Everything runs against the
// in-memory MockProvider with a fixed clock.
#![allow(dead_code)]

use autosnap_common::{FixedClock, Instance, Snapshot, Volume, NAME_TAG};
use autosnap_providers::mock::MockProvider;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const INSTANCE_ID: &str = "i-0web1";
pub const VOLUME_ID: &str = "vol-111";

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// 2017-01-10 00:00:00 UTC, nine days after the seeded snapshots.
pub fn now() -> DateTime<Utc> {
    at(2017, 1, 10, 0, 0, 0)
}

pub fn clock(now: DateTime<Utc>) -> FixedClock {
    FixedClock(now)
}

pub fn snapshot(id: &str, volume_id: &str, description: &str, start_time: DateTime<Utc>) -> Snapshot {
    Snapshot {
        id: id.to_string(),
        volume_id: Some(volume_id.to_string()),
        description: description.to_string(),
        start_time,
        tags: BTreeMap::new(),
    }
}

/// Instance "web-1" with one attached volume.
pub fn web1_provider(now: DateTime<Utc>) -> MockProvider {
    MockProvider::new()
        .with_clock(Arc::new(FixedClock(now)))
        .with_instance(Instance::new(INSTANCE_ID).with_tag(NAME_TAG, "web-1"))
        .with_volume(INSTANCE_ID, Volume::new(VOLUME_ID))
}
