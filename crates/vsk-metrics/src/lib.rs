//! Metrics registry for the snapshot reconcile loop.
//!
//! Every registry is explicitly constructed and injected into the watcher.
//! There are no ambient globals, so tests instantiate isolated registries
//! and assert on exactly the increments their scenario produced.

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use vsk_schemas::VolumeIdentity;

/// Prefix prepended to every family name in the exposition output
/// (`vsk_snapshots_performed`, ...).
pub const METRICS_PREFIX: &str = "vsk";

/// Central metrics registry: the prometheus registry plus the snapshot
/// counter family registered on it.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    snapshots: SnapshotMetrics,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(
            Registry::new_custom(Some(METRICS_PREFIX.to_string()), None)
                .context("failed to create metrics registry")?,
        );
        let snapshots = SnapshotMetrics::new(&registry)?;
        Ok(Self {
            registry,
            snapshots,
        })
    }

    pub fn snapshots(&self) -> &SnapshotMetrics {
        &self.snapshots
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode metrics")?;
        String::from_utf8(buffer).context("metrics output is not valid UTF-8")
    }

    /// The underlying registry, for callers registering their own families.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Counter/gauge family describing what the reconcile loop did.
///
/// Per-volume families are labeled with the [`VolumeIdentity`] tuple so
/// dashboards can slice by PVC even when several volumes back one workload.
#[derive(Clone)]
pub struct SnapshotMetrics {
    snapshots_performed: IntCounterVec,
    old_snapshots_removed: IntCounterVec,
    errors_total: IntCounterVec,
    snapshots_total: IntGaugeVec,
    reconcile_cycles_total: IntCounterVec,
}

const IDENTITY_LABELS: &[&str] = &["pvc_name", "pvc_namespace", "volume_id"];

fn identity_values(identity: &VolumeIdentity) -> [&str; 3] {
    [
        identity.pvc_name.as_str(),
        identity.pvc_namespace.as_str(),
        identity.volume_id.as_str(),
    ]
}

impl SnapshotMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let snapshots_performed = IntCounterVec::new(
            Opts::new(
                "snapshots_performed",
                "Snapshots created by the reconcile loop",
            ),
            IDENTITY_LABELS,
        )
        .context("failed to create snapshots_performed")?;
        registry
            .register(Box::new(snapshots_performed.clone()))
            .context("failed to register snapshots_performed")?;

        let old_snapshots_removed = IntCounterVec::new(
            Opts::new(
                "old_snapshots_removed",
                "Expired snapshots deleted by the reconcile loop",
            ),
            &["pvc_name", "pvc_namespace", "volume_id", "snapshot_id"],
        )
        .context("failed to create old_snapshots_removed")?;
        registry
            .register(Box::new(old_snapshots_removed.clone()))
            .context("failed to register old_snapshots_removed")?;

        let errors_total = IntCounterVec::new(
            Opts::new(
                "errors_total",
                "Create and delete failures observed by the reconcile loop",
            ),
            IDENTITY_LABELS,
        )
        .context("failed to create errors_total")?;
        registry
            .register(Box::new(errors_total.clone()))
            .context("failed to register errors_total")?;

        let snapshots_total = IntGaugeVec::new(
            Opts::new("snapshots_total", "Snapshots currently known per volume"),
            IDENTITY_LABELS,
        )
        .context("failed to create snapshots_total")?;
        registry
            .register(Box::new(snapshots_total.clone()))
            .context("failed to register snapshots_total")?;

        let reconcile_cycles_total = IntCounterVec::new(
            Opts::new(
                "reconcile_cycles_total",
                "Reconcile cycles completed, by outcome",
            ),
            &["outcome"],
        )
        .context("failed to create reconcile_cycles_total")?;
        registry
            .register(Box::new(reconcile_cycles_total.clone()))
            .context("failed to register reconcile_cycles_total")?;

        Ok(Self {
            snapshots_performed,
            old_snapshots_removed,
            errors_total,
            snapshots_total,
            reconcile_cycles_total,
        })
    }

    pub fn record_created(&self, identity: &VolumeIdentity) {
        self.snapshots_performed
            .with_label_values(&identity_values(identity))
            .inc();
    }

    pub fn record_removed(&self, identity: &VolumeIdentity, snapshot_id: &str) {
        self.old_snapshots_removed
            .with_label_values(&[
                identity.pvc_name.as_str(),
                identity.pvc_namespace.as_str(),
                identity.volume_id.as_str(),
                snapshot_id,
            ])
            .inc();
    }

    pub fn record_error(&self, identity: &VolumeIdentity) {
        self.errors_total
            .with_label_values(&identity_values(identity))
            .inc();
    }

    /// Set the per-volume snapshot gauge to the count observed this cycle.
    pub fn set_snapshot_count(&self, identity: &VolumeIdentity, count: i64) {
        self.snapshots_total
            .with_label_values(&identity_values(identity))
            .set(count);
    }

    pub fn record_cycle_success(&self) {
        self.reconcile_cycles_total.with_label_values(&["ok"]).inc();
    }

    pub fn record_cycle_failure(&self) {
        self.reconcile_cycles_total
            .with_label_values(&["error"])
            .inc();
    }
}
