//! Command-line and environment configuration for vsk-daemon.
//!
//! Every flag has an env-var fallback so container deployments can run the
//! binary with no arguments.  The inventory API token is deliberately not a
//! flag; `main.rs` reads it from `INVENTORY_API_TOKEN` only, so it never
//! shows up in process listings or shell history.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "vsk-daemon")]
#[command(about = "Volume snapshot reconciliation daemon", long_about = None)]
pub struct DaemonArgs {
    /// Port for the HTTP health/status/metrics server.
    #[arg(long = "http-port", env = "HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    /// Path to the snapshot rules JSON file.
    #[arg(long = "config-file", env = "VOLUME_SNAPSHOT_CONFIG_FILE")]
    pub config_file: PathBuf,

    /// Seconds to sleep between reconcile passes.
    #[arg(
        long = "poll-interval-seconds",
        env = "POLL_INTERVAL_SECONDS",
        default_value_t = 1800
    )]
    pub poll_interval_seconds: u64,

    /// Default retention window in hours, used by rules without an override.
    #[arg(
        long = "retention-period-hours",
        env = "OLD_SNAPSHOTS_RETENTION_PERIOD_HOURS",
        default_value_t = 168
    )]
    pub retention_period_hours: i64,

    /// Base URL of the block-storage inventory API.
    #[arg(long = "inventory-url", env = "INVENTORY_API_URL")]
    pub inventory_url: String,
}
