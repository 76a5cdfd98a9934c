//! Fixed-window rate limiter backed by the shared cache provider.
//!
//! The counter lives in the cache rather than in process memory, so every
//! node serving the trigger surface sees the same count once the cache
//! provider is Redis. Overflowing the window sets a lockout flag that
//! outlives the counter.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use adpool_core::config::auth::RateLimitConfig;
use adpool_core::result::AppResult;
use adpool_core::traits::cache::CacheProvider;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_limited(&self) -> bool {
        matches!(self, Self::Limited { .. })
    }
}

/// Fixed-window counter keyed by scope and identifier.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    cache: Arc<dyn CacheProvider>,
    max_hits: u32,
    window: Duration,
    lockout: Duration,
}

impl RateLimiter {
    pub fn new(
        cache: Arc<dyn CacheProvider>,
        max_hits: u32,
        window: Duration,
        lockout: Duration,
    ) -> Self {
        Self {
            cache,
            max_hits,
            window,
            lockout,
        }
    }

    /// Limiter for failed credential attempts.
    pub fn for_auth(cache: Arc<dyn CacheProvider>, config: &RateLimitConfig) -> Self {
        Self::new(
            cache,
            config.auth_max_attempts,
            Duration::from_secs(config.auth_window_seconds),
            Duration::from_secs(config.auth_lockout_seconds),
        )
    }

    fn key(scope: &str, identifier: &str) -> String {
        adpool_cache::keys::rate_limit(scope, identifier)
    }

    /// Count one hit and decide. The window starts at the first hit.
    pub async fn check(&self, scope: &str, identifier: &str) -> AppResult<RateDecision> {
        if let Some(locked) = self.locked_out(scope, identifier).await? {
            return Ok(locked);
        }
        let key = Self::key(scope, identifier);
        let count = self.cache.incr(&key).await?;
        if count == 1 {
            self.cache.expire(&key, self.window).await?;
        }
        if count >= i64::from(self.max_hits) && !self.lockout.is_zero() {
            let lock_key = adpool_cache::keys::lockout(scope, identifier);
            warn!(key = %lock_key, lockout_secs = self.lockout.as_secs(), "Locking out identifier");
            self.cache.set(&lock_key, "1", self.lockout).await?;
        }
        self.decide(&key, count).await
    }

    /// Decide on the current count without counting a hit.
    pub async fn peek(&self, scope: &str, identifier: &str) -> AppResult<RateDecision> {
        if let Some(locked) = self.locked_out(scope, identifier).await? {
            return Ok(locked);
        }
        let key = Self::key(scope, identifier);
        let count = match self.cache.get(&key).await? {
            Some(raw) => raw.parse::<i64>().unwrap_or(0),
            None => 0,
        };
        if count >= i64::from(self.max_hits) {
            return Ok(RateDecision::Limited {
                retry_after: self.retry_after(&key).await?,
            });
        }
        Ok(RateDecision::Allowed {
            remaining: remaining(self.max_hits, count),
        })
    }

    /// Clear the counter and any lockout.
    pub async fn reset(&self, scope: &str, identifier: &str) -> AppResult<()> {
        let key = Self::key(scope, identifier);
        debug!(key = %key, "Resetting rate limit counter");
        self.cache.delete(&key).await?;
        self.cache
            .delete(&adpool_cache::keys::lockout(scope, identifier))
            .await
    }

    async fn locked_out(&self, scope: &str, identifier: &str) -> AppResult<Option<RateDecision>> {
        let lock_key = adpool_cache::keys::lockout(scope, identifier);
        if !self.cache.exists(&lock_key).await? {
            return Ok(None);
        }
        let retry_after = self.cache.ttl(&lock_key).await?.unwrap_or(self.lockout);
        Ok(Some(RateDecision::Limited { retry_after }))
    }

    async fn decide(&self, key: &str, count: i64) -> AppResult<RateDecision> {
        if count > i64::from(self.max_hits) {
            let retry_after = self.retry_after(key).await?;
            warn!(key = %key, count, "Rate limit exceeded");
            return Ok(RateDecision::Limited { retry_after });
        }
        Ok(RateDecision::Allowed {
            remaining: remaining(self.max_hits, count),
        })
    }

    async fn retry_after(&self, key: &str) -> AppResult<Duration> {
        match self.cache.ttl(key).await? {
            Some(ttl) => Ok(ttl),
            // A counter without expiry would never reset; restart its window.
            None => {
                self.cache.expire(key, self.window).await?;
                Ok(self.window)
            }
        }
    }
}

fn remaining(max: u32, count: i64) -> u32 {
    u32::try_from((i64::from(max) - count).max(0)).unwrap_or(0)
}
