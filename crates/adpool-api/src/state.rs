//! Application state shared across all handlers and extractors.

use std::sync::Arc;

use adpool_auth::{JwtDecoder, RateLimiter, SystemSecret};
use adpool_core::config::AppConfig;
use adpool_core::traits::automation::AutomationBackend;
use adpool_core::traits::cache::CacheProvider;
use adpool_service::Services;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,

    // ── Auth ─────────────────────────────────────────────────
    /// Administrator token validator
    pub jwt_decoder: Arc<JwtDecoder>,
    /// Pre-shared scheduler secret
    pub system_secret: Arc<SystemSecret>,
    /// Failed-credential limiter, shared across nodes through the cache
    pub limiter: RateLimiter,

    // ── Readiness checks ─────────────────────────────────────
    /// Shared cache, also backing the limiter
    pub cache: Arc<dyn CacheProvider>,
    /// Automation backend client
    pub backend: Arc<dyn AutomationBackend>,

    // ── Services ─────────────────────────────────────────────
    /// Allocation, lifecycle, and job services
    pub services: Arc<Services>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        services: Services,
        cache: Arc<dyn CacheProvider>,
        backend: Arc<dyn AutomationBackend>,
    ) -> Self {
        Self {
            jwt_decoder: Arc::new(JwtDecoder::new(&config.auth)),
            system_secret: Arc::new(SystemSecret::new(&config.auth)),
            limiter: RateLimiter::for_auth(Arc::clone(&cache), &config.rate_limit),
            cache,
            backend,
            services: Arc::new(services),
            config,
        }
    }
}
