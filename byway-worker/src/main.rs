//! # ByWay Worker
//!
//! Runs the daily notification purge until Ctrl-C.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p byway-worker
//! ```

use byway_shared::db::pool;
use byway_worker::{config::WorkerConfig, sweeper::NotificationSweeper};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "byway_worker=debug,byway_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ByWay worker starting");

    let config = WorkerConfig::from_env()?;
    let db = pool::connect_with_retry(config.database, Duration::from_secs(5), None).await?;

    let sweeper = NotificationSweeper::new(db.clone());
    let token = sweeper.shutdown_token();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        token.cancel();
    });

    sweeper.run().await?;
    pool::close_pool(db).await;

    Ok(())
}
