//! In-memory cache implementation using the moka crate.
//!
//! Values live in moka with a per-entry expiry. Counters live in a
//! dashmap so that `incr` is atomic per key; each counter carries its own
//! deadline, checked lazily on access.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use adpool_core::config::cache::MemoryCacheConfig;
use adpool_core::result::AppResult;
use adpool_core::traits::cache::CacheProvider;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// Expires each entry at its own deadline.
struct PerEntryDeadline;

impl Expiry<String, StoredValue> for PerEntryDeadline {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(updated_at))
    }
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: i64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory cache provider using moka.
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    cache: Cache<String, StoredValue>,
    counters: Arc<DashMap<String, Counter>>,
}

impl MemoryCacheProvider {
    /// Create a new in-memory cache from configuration.
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryDeadline)
            .build();

        Self {
            cache,
            counters: Arc::new(DashMap::new()),
        }
    }

    fn live_counter(&self, key: &str) -> Option<Counter> {
        let now = Instant::now();
        let counter = self.counters.get(key).map(|c| *c)?;
        if counter.is_live(now) {
            Some(counter)
        } else {
            self.counters.remove_if(key, |_, c| !c.is_live(now));
            None
        }
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        if let Some(counter) = self.live_counter(key) {
            return Ok(Some(counter.value.to_string()));
        }
        Ok(self.cache.get(key).await.map(|v| v.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.counters.remove(key);
        self.cache
            .insert(
                key.to_string(),
                StoredValue {
                    value: value.to_string(),
                    expires_at: Instant::now() + ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.cache.remove(key).await;
        self.counters.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.live_counter(key).is_some() || self.cache.contains_key(key))
    }

    async fn incr(&self, key: &str) -> AppResult<i64> {
        let now = Instant::now();
        let mut entry = self.counters.entry(key.to_string()).or_insert(Counter {
            value: 0,
            expires_at: None,
        });
        if !entry.is_live(now) {
            *entry = Counter {
                value: 0,
                expires_at: None,
            };
        }
        entry.value += 1;
        let value = entry.value;
        debug!(key = %key, value, "Incremented in-memory counter");
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        let deadline = Instant::now() + ttl;
        if self.live_counter(key).is_some() {
            if let Some(mut counter) = self.counters.get_mut(key) {
                counter.expires_at = Some(deadline);
                return Ok(true);
            }
        }
        match self.cache.get(key).await {
            Some(mut stored) => {
                stored.expires_at = deadline;
                self.cache.insert(key.to_string(), stored).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        let now = Instant::now();
        if let Some(counter) = self.live_counter(key) {
            return Ok(counter
                .expires_at
                .map(|at| at.saturating_duration_since(now)));
        }
        Ok(self
            .cache
            .get(key)
            .await
            .map(|v| v.expires_at.saturating_duration_since(now)))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
