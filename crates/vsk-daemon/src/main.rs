//! vsk-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, parses flags, loads
//! the rules file, spawns the reconcile loop, and starts the HTTP server.
//! All route handlers live in `routes.rs`; all shared state lives in
//! `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use vsk_config::{load_rules_file, validate_retention_hours};
use vsk_daemon::{cli::DaemonArgs, routes, state};
use vsk_inventory::InventoryClient;
use vsk_inventory_http::HttpInventoryClient;
use vsk_metrics::MetricsRegistry;
use vsk_reconcile::SnapshotWatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let args = DaemonArgs::parse();
    validate_retention_hours(args.retention_period_hours)?;

    let loaded = load_rules_file(&args.config_file)?;
    info!(
        rules = loaded.rule_count(),
        config_hash = %loaded.config_hash,
        config_file = %args.config_file.display(),
        "loaded snapshot rules"
    );

    // Env-only on purpose: the token must never appear in argv.
    let token = std::env::var("INVENTORY_API_TOKEN").ok();
    let client = HttpInventoryClient::new(&args.inventory_url, token)
        .context("failed to build inventory client")?;
    let backend = client.name();

    let metrics = MetricsRegistry::new()?;
    let watcher = SnapshotWatcher::new(
        client,
        metrics.snapshots().clone(),
        args.retention_period_hours,
    );

    let shared = Arc::new(state::AppState::new(
        metrics,
        backend,
        loaded.rule_count(),
        &loaded.config_hash,
    ));

    state::spawn_watch_loop(
        Arc::clone(&shared),
        watcher,
        loaded.rules.clone(),
        Duration::from_secs(args.poll_interval_seconds),
    );

    let app = routes::build_router(Arc::clone(&shared)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], args.http_port));
    info!("vsk-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
