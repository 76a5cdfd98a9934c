//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod auth;
pub mod backend;
pub mod cache;
pub mod database;
pub mod lifecycle;
pub mod logging;
pub mod monitor;
pub mod worker;

use serde::{Deserialize, Serialize};

use self::app::ServerConfig;
use self::auth::{AuthConfig, RateLimitConfig};
use self::backend::BackendConfig;
use self::cache::CacheConfig;
use self::database::DatabaseConfig;
use self::lifecycle::LifecycleConfig;
use self::logging::LoggingConfig;
use self::monitor::MonitorConfig;
use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache provider settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Automation backend client settings.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Admin token and system secret settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Subscription and pool timing settings.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Periodic job schedule.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Expected run intervals for the job health reader.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Shared rate limiter settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `ADPOOL__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ADPOOL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
