//! Scenario: the reconcile loop folds pass outcomes into shared status.
//!
//! # Invariants under test
//!
//! 1. A successful pass increments `cycles_completed`, stores the cycle
//!    report, stamps `last_cycle_at`, and leaves the state "idle".
//! 2. A failed pass increments `cycles_failed` and records the rendered
//!    error chain; the loop stays able to succeed on the next pass, which
//!    clears the error.
//! 3. Pass outcomes are mirrored to the cycle counter by outcome label.

use std::sync::Arc;
use std::time::Duration;

use vsk_daemon::state::{run_cycle, AppState};
use vsk_inventory_memory::MemoryInventory;
use vsk_metrics::MetricsRegistry;
use vsk_reconcile::SnapshotWatcher;
use vsk_schemas::{LabelSelector, SnapshotRule, Volume};

// ---------------------------------------------------------------------------
// Fixture helpers
// ---------------------------------------------------------------------------

fn backup_rule() -> SnapshotRule {
    SnapshotRule {
        labels: LabelSelector::new("backup", "hourly"),
        interval_seconds: 3600,
        retention_period_hours: None,
    }
}

fn setup(inv: &MemoryInventory) -> (Arc<AppState>, SnapshotWatcher<MemoryInventory>) {
    let metrics = MetricsRegistry::new().expect("metrics registry should build");
    let watcher = SnapshotWatcher::new(inv.clone(), metrics.snapshots().clone(), 168)
        .with_delete_pacing(Duration::ZERO);
    let state = Arc::new(AppState::new(metrics, "memory", 1, "cafe"));
    (state, watcher)
}

// ---------------------------------------------------------------------------
// 1. Success path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_pass_updates_counters_and_stores_the_report() {
    let inv = MemoryInventory::new();
    inv.seed_volume(Volume::new("vol-a").with_tag("backup", "hourly"));
    let (state, watcher) = setup(&inv);
    let rules = vec![backup_rule()];

    run_cycle(&state, &watcher, &rules).await;

    let status = state.status.read().await.clone();
    assert_eq!(status.cycles_completed, 1);
    assert_eq!(status.cycles_failed, 0);
    assert_eq!(status.state, "idle");
    assert!(status.last_cycle_at.is_some());
    assert!(status.last_error.is_none());

    let report = status.last_cycle.expect("report should be stored");
    assert_eq!(report.volumes_matched, 1);
    assert_eq!(report.created, 1, "bare volume should have been snapshotted");
}

// ---------------------------------------------------------------------------
// 2 + 3. Failure path, then recovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_pass_records_the_error_and_the_loop_recovers() {
    let inv = MemoryInventory::new();
    inv.seed_volume(Volume::new("vol-a").with_tag("backup", "hourly"));
    inv.fail_get_volumes("inventory api down");
    let (state, watcher) = setup(&inv);
    let rules = vec![backup_rule()];

    run_cycle(&state, &watcher, &rules).await;
    {
        let status = state.status.read().await;
        assert_eq!(status.cycles_failed, 1);
        assert_eq!(status.cycles_completed, 0);
        assert_eq!(status.state, "idle");
        let err = status.last_error.clone().expect("error should be recorded");
        assert!(err.contains("error while fetching volumes"), "got: {err}");
    }

    inv.clear_failures();
    run_cycle(&state, &watcher, &rules).await;

    let status = state.status.read().await.clone();
    assert_eq!(status.cycles_completed, 1);
    assert_eq!(status.cycles_failed, 1);
    assert!(status.last_error.is_none(), "success clears the error");

    let text = state.metrics.export().expect("export should render");
    assert!(
        text.contains(r#"vsk_reconcile_cycles_total{outcome="error"} 1"#),
        "got:\n{text}"
    );
    assert!(
        text.contains(r#"vsk_reconcile_cycles_total{outcome="ok"} 1"#),
        "got:\n{text}"
    );
}
