//! Trigger-surface authentication configuration.

use serde::{Deserialize, Serialize};

/// Admin token verification and system secret configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for JWT verification (HMAC-SHA256).
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Expected `iss` claim, if any.
    #[serde(default)]
    pub jwt_issuer: Option<String>,
    /// Pre-shared secret accepted from schedulers in `X-System-Secret`.
    #[serde(default)]
    pub system_secret: Option<String>,
    /// Role claim value that grants administrator access.
    #[serde(default = "default_admin_role")]
    pub admin_role: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_issuer: None,
            system_secret: None,
            admin_role: default_admin_role(),
        }
    }
}

/// Shared fixed-window rate limiter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Failed credential attempts allowed per window.
    #[serde(default = "default_auth_max_attempts")]
    pub auth_max_attempts: u32,
    /// Window length in seconds.
    #[serde(default = "default_auth_window")]
    pub auth_window_seconds: u64,
    /// Lockout after the limit is exceeded, in seconds.
    #[serde(default = "default_auth_lockout")]
    pub auth_lockout_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_max_attempts: default_auth_max_attempts(),
            auth_window_seconds: default_auth_window(),
            auth_lockout_seconds: default_auth_lockout(),
        }
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_admin_role() -> String {
    "admin".to_string()
}

fn default_auth_max_attempts() -> u32 {
    5
}

fn default_auth_window() -> u64 {
    900
}

fn default_auth_lockout() -> u64 {
    1800
}
