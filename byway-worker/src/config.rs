/// Worker configuration from the environment
///
/// - `DATABASE_URL` (required)
/// - `DATABASE_MAX_CONNECTIONS` (default 2)

use anyhow::Context;
use byway_shared::db::pool::DatabaseConfig;
use std::env;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid DATABASE_MAX_CONNECTIONS: {}", raw))?,
            Err(_) => 2,
        };

        Ok(Self {
            database: DatabaseConfig {
                url,
                max_connections,
                min_connections: 1,
                ..Default::default()
            },
        })
    }
}
