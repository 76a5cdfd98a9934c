//! # adpool-backend
//!
//! Clients for the automation backend that physically owns session files
//! and runs the bots.
//!
//! - **http**: JSON-over-HTTP client for the real backend
//! - **memory**: In-process stand-in used for local runs and tests

#[cfg(feature = "http")]
pub mod http;
pub mod memory;

use std::sync::Arc;

use tracing::info;

use adpool_core::config::backend::BackendConfig;
use adpool_core::error::AppError;
use adpool_core::result::AppResult;
use adpool_core::traits::automation::AutomationBackend;

pub use memory::MemoryAutomationBackend;

/// Build the backend client selected by configuration.
pub fn build_backend(config: &BackendConfig) -> AppResult<Arc<dyn AutomationBackend>> {
    match config.kind.as_str() {
        #[cfg(feature = "http")]
        "http" => {
            info!(base_url = %config.base_url, "Using HTTP automation backend");
            Ok(Arc::new(http::HttpAutomationBackend::new(config)?))
        }
        "memory" => {
            info!("Using in-memory automation backend");
            Ok(Arc::new(MemoryAutomationBackend::new()))
        }
        other => Err(AppError::configuration(format!(
            "Unknown automation backend: '{other}'. Supported: http, memory"
        ))),
    }
}
