//! # ByWay API Server
//!
//! REST backend for the ByWay e-learning platform: accounts, courses,
//! orders, notifications, analytics and homepage layout under `/api/v1`.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p byway-api
//! ```

use byway_api::{
    app::{build_router, AppState, Services},
    config::Config,
};
use byway_shared::{
    db::{migrations::run_migrations, pool},
    redis::{RedisClient, RedisConfig},
};
use std::{net::SocketAddr, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DB_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "byway_api=debug,byway_shared=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.api.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.api.environment,
        "ByWay API server starting"
    );

    let db = pool::connect_with_retry(
        pool::DatabaseConfig {
            url: config.database.url.clone(),
            max_connections: config.database.max_connections,
            ..Default::default()
        },
        DB_RETRY_DELAY,
        None,
    )
    .await?;
    run_migrations(&db).await?;

    let services = Services::from_config(&config)?;
    let redis_url = config.redis_url.clone();
    let bind_address = config.bind_address();

    let mut state = AppState::new(db, config, services);
    match redis_url {
        Some(url) => match RedisClient::new(RedisConfig::new(url)).await {
            Ok(client) => state = state.with_redis(client),
            Err(e) => tracing::warn!(error = %e, "Redis unavailable, rate limiting disabled"),
        },
        None => tracing::info!("REDIS_URL not set, rate limiting disabled"),
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
