//! Shared fixtures for cross-crate scenario tests.
//!
//! The builders here assemble an in-memory fleet plus a watcher wired to
//! it, so the scenarios under `tests/` read as policy statements rather
//! than setup plumbing. Panicking on broken fixtures is fine here; this
//! crate is only ever linked into tests.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use vsk_inventory_memory::MemoryInventory;
use vsk_metrics::MetricsRegistry;
use vsk_reconcile::SnapshotWatcher;
use vsk_schemas::{
    LabelSelector, Snapshot, SnapshotRule, SnapshotState, Volume, TAG_PVC_NAME, TAG_PVC_NAMESPACE,
};

/// Rules fixture matching the fleets built by [`volume`] and friends.
pub const SAMPLE_RULES_JSON: &str = r#"[
  {"labels": {"key": "backup", "value": "hourly"}, "intervalSeconds": 3600},
  {"labels": {"key": "backup", "value": "daily"}, "intervalSeconds": 86400, "retentionPeriodHours": 48}
]"#;

// ---------------------------------------------------------------------------
// Rule and fleet builders
// ---------------------------------------------------------------------------

pub fn rule(key: &str, value: &str, interval_seconds: i64) -> SnapshotRule {
    SnapshotRule {
        labels: LabelSelector::new(key, value),
        interval_seconds,
        retention_period_hours: None,
    }
}

pub fn rule_with_retention(
    key: &str,
    value: &str,
    interval_seconds: i64,
    retention_hours: i64,
) -> SnapshotRule {
    SnapshotRule {
        retention_period_hours: Some(retention_hours),
        ..rule(key, value, interval_seconds)
    }
}

pub fn volume(id: &str, key: &str, value: &str) -> Volume {
    Volume::new(id).with_tag(key, value)
}

/// A volume carrying the provisioning tags that feed metric labels.
pub fn pvc_volume(id: &str, pvc_name: &str, pvc_namespace: &str, key: &str, value: &str) -> Volume {
    volume(id, key, value)
        .with_tag(TAG_PVC_NAME, pvc_name)
        .with_tag(TAG_PVC_NAMESPACE, pvc_namespace)
}

pub fn snapshot_aged_secs(
    id: &str,
    volume_id: &str,
    age_secs: i64,
    state: SnapshotState,
) -> Snapshot {
    Snapshot::new(
        id,
        volume_id,
        Utc::now() - chrono::Duration::seconds(age_secs),
        state,
    )
}

pub fn snapshot_aged_hours(
    id: &str,
    volume_id: &str,
    age_hours: i64,
    state: SnapshotState,
) -> Snapshot {
    snapshot_aged_secs(id, volume_id, age_hours * 3600, state)
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// An in-memory fleet plus the watcher wired to it.
///
/// Delete pacing is zeroed so sweep-heavy scenarios finish instantly.
pub struct Harness {
    pub inventory: MemoryInventory,
    pub metrics: MetricsRegistry,
    pub watcher: SnapshotWatcher<MemoryInventory>,
}

pub fn harness(default_retention_hours: i64) -> Harness {
    let inventory = MemoryInventory::new();
    let metrics = MetricsRegistry::new().expect("metrics registry should build");
    let watcher = SnapshotWatcher::new(
        inventory.clone(),
        metrics.snapshots().clone(),
        default_retention_hours,
    )
    .with_delete_pacing(Duration::ZERO);
    Harness {
        inventory,
        metrics,
        watcher,
    }
}

// ---------------------------------------------------------------------------
// Rules-file fixtures
// ---------------------------------------------------------------------------

/// Write `json` to a temp file and return the handle; the file lives as
/// long as the returned guard does.
pub fn write_rules_file(json: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new().context("create temp rules file")?;
    file.write_all(json.as_bytes())
        .context("write temp rules file")?;
    Ok(file)
}
