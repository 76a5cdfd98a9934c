//! Postgres pool for the session registry and adbot tables.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use adpool_core::config::database::DatabaseConfig;
use adpool_core::error::{AppError, ErrorKind};
use adpool_core::result::AppResult;
use adpool_core::types::redact::redact_url;

/// Owns the sqlx pool shared by every repository.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        info!(
            url = %redact_url(&config.url),
            max_connections = config.max_connections,
            "Connecting to Postgres"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .test_before_acquire(true)
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Cannot reach {}", redact_url(&config.url)),
                    e,
                )
            })?;

        info!(idle = pool.num_idle(), "Postgres pool ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wait for in-flight queries, then drop every connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Postgres pool closed");
    }
}
