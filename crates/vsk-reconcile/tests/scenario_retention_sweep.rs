//! Scenario: Retention sweep prunes expired snapshots
//!
//! # Invariants under test
//!
//! 1. The sweep runs even when the volume is up to date: expired snapshots
//!    of a fresh volume are still pruned.
//! 2. Snapshots inside the retention window survive the sweep that deletes
//!    their expired siblings.
//! 3. A rule-level retention override wins over the watcher default.
//! 4. Deletions are recorded per snapshot id in the metrics, and the
//!    per-volume gauge reports the count observed at the start of the pass.
//!
//! All tests run in-process against the in-memory inventory backend.

use std::time::Duration;

use chrono::Utc;
use vsk_inventory_memory::MemoryInventory;
use vsk_metrics::MetricsRegistry;
use vsk_reconcile::SnapshotWatcher;
use vsk_schemas::{LabelSelector, Snapshot, SnapshotRule, SnapshotState, Volume};

// ---------------------------------------------------------------------------
// Fixture helpers
// ---------------------------------------------------------------------------

fn rule_with_retention(interval_seconds: i64, retention_hours: Option<i64>) -> SnapshotRule {
    SnapshotRule {
        labels: LabelSelector::new("backup", "hourly"),
        interval_seconds,
        retention_period_hours: retention_hours,
    }
}

fn snap_aged_hours(id: &str, volume_id: &str, age_hours: i64) -> Snapshot {
    Snapshot::new(
        id,
        volume_id,
        Utc::now() - chrono::Duration::hours(age_hours),
        SnapshotState::Ok,
    )
}

fn watcher_with_retention(
    inv: &MemoryInventory,
    default_retention_hours: i64,
) -> (SnapshotWatcher<MemoryInventory>, MetricsRegistry) {
    let metrics = MetricsRegistry::new().unwrap();
    let watcher = SnapshotWatcher::new(
        inv.clone(),
        metrics.snapshots().clone(),
        default_retention_hours,
    )
    .with_delete_pacing(Duration::ZERO);
    (watcher, metrics)
}

// ---------------------------------------------------------------------------
// 1. Decoupled sweep: fresh volume still pruned
// ---------------------------------------------------------------------------

#[tokio::test]
async fn up_to_date_volume_still_gets_expired_snapshots_pruned() {
    let inv = MemoryInventory::new();
    inv.seed_volume(Volume::new("vol-a").with_tag("backup", "hourly"));
    inv.seed_snapshot(snap_aged_hours("snap-fresh", "vol-a", 0));
    inv.seed_snapshot(snap_aged_hours("snap-expired", "vol-a", 200));

    let (watcher, _metrics) = watcher_with_retention(&inv, 168);
    let report = watcher
        .watch_snapshots(&[rule_with_retention(3600, None)])
        .await
        .unwrap();

    assert!(inv.created_calls().is_empty());
    assert_eq!(inv.removed_calls(), vec!["snap-expired"]);
    assert_eq!(report.up_to_date, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.retained, 1);
}

// ---------------------------------------------------------------------------
// 2. In-retention siblings survive
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_deletes_only_out_of_retention_snapshots() {
    let inv = MemoryInventory::new();
    inv.seed_volume(Volume::new("vol-a").with_tag("backup", "hourly"));
    inv.seed_snapshot(snap_aged_hours("snap-recent", "vol-a", 0));
    inv.seed_snapshot(snap_aged_hours("snap-inside", "vol-a", 167));
    inv.seed_snapshot(snap_aged_hours("snap-beyond", "vol-a", 169));
    inv.seed_snapshot(snap_aged_hours("snap-ancient", "vol-a", 400));

    let (watcher, _metrics) = watcher_with_retention(&inv, 168);
    let report = watcher
        .watch_snapshots(&[rule_with_retention(3600, None)])
        .await
        .unwrap();

    // Sweep order follows the index: newest first.
    assert_eq!(inv.removed_calls(), vec!["snap-beyond", "snap-ancient"]);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.retained, 2);

    let survivors: Vec<String> = inv.snapshots().into_iter().map(|s| s.id).collect();
    assert!(survivors.contains(&"snap-recent".to_string()));
    assert!(survivors.contains(&"snap-inside".to_string()));
}

// ---------------------------------------------------------------------------
// 3. Per-rule retention override
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rule_retention_override_wins_over_default() {
    let inv = MemoryInventory::new();
    inv.seed_volume(Volume::new("vol-a").with_tag("backup", "hourly"));
    inv.seed_snapshot(snap_aged_hours("snap-fresh", "vol-a", 0));
    // 48 h old: inside the 168 h default, outside the rule's 24 h override.
    inv.seed_snapshot(snap_aged_hours("snap-two-days", "vol-a", 48));

    let (watcher, _metrics) = watcher_with_retention(&inv, 168);
    let report = watcher
        .watch_snapshots(&[rule_with_retention(3600, Some(24))])
        .await
        .unwrap();

    assert_eq!(inv.removed_calls(), vec!["snap-two-days"]);
    assert_eq!(report.deleted, 1);
}

#[tokio::test]
async fn default_retention_applies_when_rule_has_no_override() {
    let inv = MemoryInventory::new();
    inv.seed_volume(Volume::new("vol-a").with_tag("backup", "hourly"));
    inv.seed_snapshot(snap_aged_hours("snap-fresh", "vol-a", 0));
    inv.seed_snapshot(snap_aged_hours("snap-two-days", "vol-a", 48));

    let (watcher, _metrics) = watcher_with_retention(&inv, 168);
    let report = watcher
        .watch_snapshots(&[rule_with_retention(3600, None)])
        .await
        .unwrap();

    assert!(inv.removed_calls().is_empty());
    assert_eq!(report.deleted, 0);
    assert_eq!(report.retained, 2);
}

// ---------------------------------------------------------------------------
// 4. Metrics: deletion labels and gauge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_records_deletions_and_pre_sweep_gauge() {
    let inv = MemoryInventory::new();
    inv.seed_volume(Volume::new("vol-a").with_tag("backup", "hourly"));
    inv.seed_snapshot(snap_aged_hours("snap-fresh", "vol-a", 0));
    inv.seed_snapshot(snap_aged_hours("snap-expired", "vol-a", 200));

    let (watcher, metrics) = watcher_with_retention(&inv, 168);
    watcher
        .watch_snapshots(&[rule_with_retention(3600, None)])
        .await
        .unwrap();

    let text = metrics.export().unwrap();
    assert!(text.contains("vsk_old_snapshots_removed"), "{text}");
    assert!(text.contains("snapshot_id=\"snap-expired\""), "{text}");

    // Gauge reflects the two snapshots observed before the sweep deleted one.
    let gauge_line = text
        .lines()
        .find(|l| l.starts_with("vsk_snapshots_total{"))
        .unwrap();
    assert!(gauge_line.ends_with(" 2"), "{gauge_line}");
}
