use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use vsk_inventory::InventoryClient;
use vsk_metrics::SnapshotMetrics;
use vsk_schemas::{Snapshot, SnapshotRule, Volume, VolumeIdentity};

use crate::engine::{assess_freshness, split_by_retention, FreshnessVerdict};

/// Delay between successive delete calls within one volume's sweep.
/// Deliberate backpressure so a large backlog does not hammer the backend.
pub const DEFAULT_DELETE_PACING: Duration = Duration::from_secs(2);

/// What one reconciliation pass did. Returned to the poll loop and surfaced
/// on the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    /// Volume×rule evaluations performed (a volume matching two rules counts twice).
    pub volumes_matched: u64,
    pub up_to_date: u64,
    pub created: u64,
    pub create_failures: u64,
    pub deleted: u64,
    /// Within-retention snapshots left alone during sweeps.
    pub retained: u64,
    pub delete_failures: u64,
}

impl CycleReport {
    fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            volumes_matched: 0,
            up_to_date: 0,
            created: 0,
            create_failures: 0,
            deleted: 0,
            retained: 0,
            delete_failures: 0,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.create_failures > 0 || self.delete_failures > 0
    }
}

/// Executes the snapshot policy against an inventory backend.
///
/// One call to [`watch_snapshots`](Self::watch_snapshots) is one full
/// reconciliation pass: fetch inventory, then walk rules → volumes →
/// snapshots sequentially. The watcher keeps no state between passes; every
/// pass re-derives its decisions from a fresh listing.
pub struct SnapshotWatcher<C> {
    client: C,
    metrics: SnapshotMetrics,
    default_retention_hours: i64,
    delete_pacing: Duration,
}

impl<C: InventoryClient> SnapshotWatcher<C> {
    pub fn new(client: C, metrics: SnapshotMetrics, default_retention_hours: i64) -> Self {
        Self {
            client,
            metrics,
            default_retention_hours,
            delete_pacing: DEFAULT_DELETE_PACING,
        }
    }

    /// Replace the delay between successive delete calls. Tests use zero.
    pub fn with_delete_pacing(mut self, pacing: Duration) -> Self {
        self.delete_pacing = pacing;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run one reconciliation pass over every rule.
    ///
    /// A fetch failure aborts the pass before any mutation. Per-volume create
    /// failures and per-snapshot delete failures are logged, counted, and
    /// contained; the pass continues with the remaining work.
    pub async fn watch_snapshots(&self, rules: &[SnapshotRule]) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4();

        let volumes = self
            .client
            .get_volumes()
            .await
            .context("error while fetching volumes")?;
        let index = self
            .client
            .get_snapshots()
            .await
            .context("error while fetching snapshots")?;

        info!(
            %cycle_id,
            backend = self.client.name(),
            volumes = volumes.len(),
            snapshots = index.snapshot_count(),
            "checking volumes and snapshots"
        );

        let mut report = CycleReport::new(cycle_id);
        let now = Utc::now();

        for rule in rules {
            let acceptable_start_time = now - rule.freshness_window();
            let retention_start_date = now - rule.retention_period(self.default_retention_hours);

            for volume in volumes.values() {
                if !rule.labels.matches(volume) {
                    continue;
                }
                report.volumes_matched += 1;
                self.reconcile_volume(
                    volume,
                    index.volume_snapshots(&volume.id),
                    acceptable_start_time,
                    retention_start_date,
                    &mut report,
                )
                .await;
            }
        }

        info!(
            %cycle_id,
            matched = report.volumes_matched,
            created = report.created,
            deleted = report.deleted,
            create_failures = report.create_failures,
            delete_failures = report.delete_failures,
            "finished checking volumes and snapshots"
        );
        Ok(report)
    }

    /// Evaluate one volume under one rule: freshness first, then the
    /// retention sweep. A failed create returns early so the sweep never
    /// runs on a volume we just failed to back up.
    async fn reconcile_volume(
        &self,
        volume: &Volume,
        snapshots: &[Snapshot],
        acceptable_start_time: DateTime<Utc>,
        retention_start_date: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let identity = VolumeIdentity::from_volume(volume);
        self.metrics
            .set_snapshot_count(&identity, snapshots.len() as i64);

        let verdict = assess_freshness(snapshots.first(), acceptable_start_time);
        if verdict.needs_snapshot() {
            match self.client.create_snapshot(volume).await {
                Ok(()) => {
                    info!(
                        volume_id = %volume.id,
                        reason = verdict.as_str(),
                        "created snapshot for volume"
                    );
                    self.metrics.record_created(&identity);
                    report.created += 1;
                }
                Err(err) => {
                    error!(
                        volume_id = %volume.id,
                        error = %err,
                        "error occurred while creating snapshot"
                    );
                    self.metrics.record_error(&identity);
                    report.create_failures += 1;
                    return;
                }
            }
        } else {
            debug!(volume_id = %volume.id, "volume has an up to date snapshot");
            report.up_to_date += 1;
        }

        self.sweep_expired(volume, &identity, snapshots, retention_start_date, report)
            .await;
    }

    /// Delete every snapshot of `volume` that has outlived retention,
    /// pacing consecutive delete calls. Failures skip to the next snapshot.
    async fn sweep_expired(
        &self,
        volume: &Volume,
        identity: &VolumeIdentity,
        snapshots: &[Snapshot],
        retention_start_date: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let (retained, expired) = split_by_retention(snapshots, retention_start_date);

        for snapshot in retained {
            debug!(
                volume_id = %volume.id,
                snapshot_id = %snapshot.id,
                "skipped snapshot removal, retention period not exceeded"
            );
            report.retained += 1;
        }

        for (position, snapshot) in expired.into_iter().enumerate() {
            if position > 0 {
                tokio::time::sleep(self.delete_pacing).await;
            }
            match self.client.remove_snapshot(snapshot).await {
                Ok(()) => {
                    info!(
                        volume_id = %volume.id,
                        snapshot_id = %snapshot.id,
                        "old snapshot has been deleted"
                    );
                    self.metrics.record_removed(identity, &snapshot.id);
                    report.deleted += 1;
                }
                Err(err) => {
                    error!(
                        volume_id = %volume.id,
                        snapshot_id = %snapshot.id,
                        error = %err,
                        "failed to remove old snapshot"
                    );
                    self.metrics.record_error(identity);
                    report.delete_failures += 1;
                }
            }
        }
    }
}
