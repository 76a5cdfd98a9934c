//! Redis connection shared by the rate limiter counters.

use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use adpool_core::config::cache::RedisCacheConfig;
use adpool_core::error::{AppError, ErrorKind};
use adpool_core::result::AppResult;
use adpool_core::types::redact::redact_url;

/// Reconnecting Redis connection.
#[derive(Debug, Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(config: &RedisCacheConfig) -> AppResult<Self> {
        let url = redact_url(&config.url);
        info!(url = %url, "Connecting to Redis");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, format!("Invalid Redis URL {url}"), e)
        })?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::with_source(ErrorKind::Cache, format!("Cannot reach Redis at {url}"), e)
        })?;

        Ok(Self { conn })
    }

    /// A handle onto the shared multiplexed connection.
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}
