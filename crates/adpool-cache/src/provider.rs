//! Cache manager that dispatches to the configured backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use adpool_core::config::cache::{CacheBackend, CacheConfig};
use adpool_core::result::AppResult;
use adpool_core::traits::cache::CacheProvider;

/// The cache the rest of the process talks to.
#[derive(Debug, Clone)]
pub struct CacheManager {
    backend: CacheBackend,
    inner: Arc<dyn CacheProvider>,
}

impl CacheManager {
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        let inner = match config.provider {
            CacheBackend::Redis => redis_provider(config).await?,
            CacheBackend::Memory => memory_provider(config)?,
        };
        info!(backend = %config.provider, "Cache provider ready");
        Ok(Self {
            backend: config.provider,
            inner,
        })
    }

    pub fn backend(&self) -> CacheBackend {
        self.backend
    }
}

#[cfg(feature = "redis-backend")]
async fn redis_provider(config: &CacheConfig) -> AppResult<Arc<dyn CacheProvider>> {
    let client = crate::redis::RedisClient::connect(&config.redis).await?;
    Ok(Arc::new(crate::redis::RedisCacheProvider::new(client)))
}

#[cfg(not(feature = "redis-backend"))]
async fn redis_provider(_config: &CacheConfig) -> AppResult<Arc<dyn CacheProvider>> {
    Err(adpool_core::error::AppError::configuration(
        "Cache backend 'redis' requires the redis-backend feature",
    ))
}

#[cfg(feature = "memory")]
fn memory_provider(config: &CacheConfig) -> AppResult<Arc<dyn CacheProvider>> {
    Ok(Arc::new(crate::memory::MemoryCacheProvider::new(&config.memory)))
}

#[cfg(not(feature = "memory"))]
fn memory_provider(_config: &CacheConfig) -> AppResult<Arc<dyn CacheProvider>> {
    Err(adpool_core::error::AppError::configuration(
        "Cache backend 'memory' requires the memory feature",
    ))
}

#[async_trait]
impl CacheProvider for CacheManager {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.inner.exists(key).await
    }

    async fn incr(&self, key: &str) -> AppResult<i64> {
        self.inner.incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        self.inner.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        self.inner.ttl(key).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
