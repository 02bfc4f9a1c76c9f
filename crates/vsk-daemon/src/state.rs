//! Shared runtime state for vsk-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; the reconcile loop writes into the
//! same state from its background task.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::error;

use vsk_inventory::InventoryClient;
use vsk_metrics::MetricsRegistry;
use vsk_reconcile::{CycleReport, SnapshotWatcher};
use vsk_schemas::SnapshotRule;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of daemon state, returned by GET /v1/status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    /// "idle" | "reconciling"
    pub state: String,
    /// Which inventory backend the watcher talks to.
    pub backend: String,
    /// Number of rules loaded from the rules file at boot.
    pub rule_count: usize,
    /// Hash of the canonical rules JSON, for deploy attribution.
    pub config_hash: String,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    /// Report from the most recent successful pass.
    pub last_cycle: Option<CycleReport>,
    /// When the most recent pass (of either outcome) finished.
    pub last_cycle_at: Option<DateTime<Utc>>,
    /// Rendered error chain of the most recent failed pass; cleared on success.
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Static build metadata.
    pub build: BuildInfo,
    /// Mutable reconcile-loop status.
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// Prometheus registry backing GET /metrics.
    pub metrics: MetricsRegistry,
}

impl AppState {
    pub fn new(
        metrics: MetricsRegistry,
        backend: impl Into<String>,
        rule_count: usize,
        config_hash: impl Into<String>,
    ) -> Self {
        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            state: "idle".to_string(),
            backend: backend.into(),
            rule_count,
            config_hash: config_hash.into(),
            cycles_completed: 0,
            cycles_failed: 0,
            last_cycle: None,
            last_cycle_at: None,
            last_error: None,
        };

        Self {
            build: BuildInfo {
                service: "vsk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: Arc::new(RwLock::new(initial_status)),
            metrics,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn the background reconcile loop.
///
/// The first pass starts immediately; each later pass starts `interval`
/// after the previous one finished. A failed pass is logged and counted,
/// never fatal to the loop.
pub fn spawn_watch_loop<C>(
    state: Arc<AppState>,
    watcher: SnapshotWatcher<C>,
    rules: Vec<SnapshotRule>,
    interval: Duration,
) where
    C: InventoryClient + 'static,
{
    tokio::spawn(async move {
        loop {
            run_cycle(&state, &watcher, &rules).await;
            tokio::time::sleep(interval).await;
        }
    });
}

/// Run one reconcile pass and fold the outcome into the shared status.
pub async fn run_cycle<C>(state: &AppState, watcher: &SnapshotWatcher<C>, rules: &[SnapshotRule])
where
    C: InventoryClient,
{
    {
        let mut st = state.status.write().await;
        st.state = "reconciling".to_string();
    }

    let outcome = watcher.watch_snapshots(rules).await;

    let mut st = state.status.write().await;
    st.daemon_uptime_secs = uptime_secs();
    st.last_cycle_at = Some(Utc::now());
    st.state = "idle".to_string();
    match outcome {
        Ok(report) => {
            state.metrics.snapshots().record_cycle_success();
            st.cycles_completed += 1;
            st.last_cycle = Some(report);
            st.last_error = None;
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "reconcile pass failed");
            state.metrics.snapshots().record_cycle_failure();
            st.cycles_failed += 1;
            st.last_error = Some(format!("{err:#}"));
        }
    }
}
