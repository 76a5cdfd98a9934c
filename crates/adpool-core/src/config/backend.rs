//! Automation backend client configuration.

use serde::{Deserialize, Serialize};

/// Where and how to reach the automation backend that owns the session files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// `"http"` for the real backend, `"memory"` for a local in-process one.
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Base URL of the backend API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional bearer token sent with every request.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            base_url: default_base_url(),
            api_token: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_kind() -> String {
    "http".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    10
}
