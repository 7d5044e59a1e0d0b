//! # Mercado Worker
//!
//! Runs the inactivity sweeper against the shared SQLite database.
//!
//! ```text
//! MERCADO_DATABASE_PATH=/var/lib/mercado/mercado.db \
//! MERCADO_SWEEP_INTERVAL_SECS=30 \
//! RUST_LOG=info,mercado=debug mercado-worker [path/to/engine.toml]
//! ```

use std::path::PathBuf;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use mercado_db::Database;
use mercado_engine::telemetry::init_tracing;
use mercado_engine::{
    Engine, EngineConfig, InactivitySweeper, Notification, Notifier, TracingNotifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Mercado worker");

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = EngineConfig::load_or_default(config_path);

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }

    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;
    let (engine, notifications) = Engine::from_config(db.clone(), &config);
    let relay = notifications.map(|rx| tokio::spawn(relay_notifications(rx)));

    if config.sweeper.enabled {
        let (sweeper, handle) = InactivitySweeper::new(engine, config.sweeper.clone());
        let task = tokio::spawn(sweeper.run());

        shutdown_signal().await;

        handle.shutdown().await;
        if let Err(e) = task.await {
            error!(error = %e, "Sweeper task ended abnormally");
        }
    } else {
        warn!("Inactivity sweeper disabled by configuration; nothing to do");
        drop(engine);
    }

    // Every sender is gone once the engine is dropped.
    if let Some(relay) = relay {
        if let Err(e) = relay.await {
            error!(error = %e, "Notification relay ended abnormally");
        }
    }

    db.close().await;
    info!("Worker shutdown complete");
    Ok(())
}

/// Drains expiry notifications into the log until the engine is dropped.
async fn relay_notifications(mut rx: mpsc::Receiver<Notification>) {
    let sink = TracingNotifier;
    while let Some(notification) = rx.recv().await {
        if let Err(e) = sink.notify(&notification) {
            warn!(kind = notification.kind(), error = %e, "Notification not relayed");
        }
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping sweeper...");
}
