//! ProxGuard telemetry server.
//!
//! Thin process shell around `proxguard-core`:
//! - serves the REST + WebSocket adapter on the configured port
//! - restores the device snapshot at startup
//! - runs the periodic maintenance tasks (TTL prune, snapshot persist,
//!   alert dedup sweep)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use proxguard_core::{create_router, AppState, Dispatcher, GuardConfig};

#[derive(Parser, Debug)]
#[command(name = "proxguard-server", about = "ProxGuard proximity-safety telemetry server")]
struct Args {
    /// HTTP port for the REST API and WebSocket stream
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Snapshot file location (overrides PROXGUARD_SNAPSHOT_PATH)
    #[arg(long, value_name = "PATH")]
    snapshot_path: Option<PathBuf>,

    /// Interval between TTL prune sweeps in milliseconds
    #[arg(long, default_value = "10000")]
    prune_interval_ms: u64,

    /// Interval between snapshot persists in milliseconds
    #[arg(long, default_value = "10000")]
    snapshot_interval_ms: u64,

    /// Interval between dedup-table sweeps in milliseconds
    #[arg(long, default_value = "10000")]
    sweep_interval_ms: u64,

    /// Skip snapshot restore at startup
    #[arg(long)]
    no_restore: bool,
}

/// Periodically drop devices whose TTL elapsed.
async fn prune_task(dispatcher: Arc<Dispatcher>, tick_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let pruned = dispatcher.prune();
        if !pruned.is_empty() {
            info!(count = pruned.len(), "pruned stale devices");
        }
    }
}

/// Periodically persist the device snapshot. Failures are logged and
/// never fatal.
async fn snapshot_task(dispatcher: Arc<Dispatcher>, tick_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        if let Err(err) = dispatcher.save_snapshot() {
            warn!(error = %err, "snapshot persist failed");
        }
    }
}

/// Periodically evict aged alert dedup entries.
async fn sweep_task(dispatcher: Arc<Dispatcher>, tick_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        dispatcher.sweep_dedup();
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = GuardConfig::from_env();
    if let Some(path) = args.snapshot_path.clone() {
        config.snapshot_path = path;
    }

    let state = AppState::new(config);
    let dispatcher = state.dispatcher().clone();

    if args.no_restore {
        info!("snapshot restore skipped (--no-restore)");
    } else {
        match dispatcher.load_snapshot() {
            Ok(0) => info!("no snapshot to restore, starting with an empty world"),
            Ok(count) => info!(devices = count, "snapshot restored"),
            Err(err) => warn!(error = %err, "snapshot restore failed, starting empty"),
        }
    }

    tokio::spawn(prune_task(dispatcher.clone(), args.prune_interval_ms));
    tokio::spawn(snapshot_task(dispatcher.clone(), args.snapshot_interval_ms));
    tokio::spawn(sweep_task(dispatcher.clone(), args.sweep_interval_ms));

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!(%addr, "ProxGuard server listening");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%addr, error = %err, "failed to bind listener");
            return;
        }
    };

    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "server exited with error");
    }
}
