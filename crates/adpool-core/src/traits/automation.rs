//! Seam to the external automation backend that physically owns session files.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::automation::{ExternalListing, VerifyOutcome};

/// Client for the automation backend.
///
/// Every call is bounded by a short timeout. Callers decide whether a
/// failure is fatal: only the assignment handshake treats it as such.
#[async_trait]
pub trait AutomationBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Partitioned listing of every session file the backend knows about.
    async fn list_sessions(&self) -> AppResult<ExternalListing>;

    /// Check that a file exists and is usable.
    async fn verify(&self, locator: &str) -> AppResult<VerifyOutcome>;

    /// Move a file into the owner's assigned area.
    async fn assign(&self, locator: &str, owner: &str) -> AppResult<()>;

    /// Release a file back to the unused area.
    async fn unassign(&self, locator: &str, owner: &str) -> AppResult<()>;

    /// Move a file into the banned area.
    async fn ban(&self, locator: &str) -> AppResult<()>;

    /// Move a banned file back to the unused area.
    async fn unban(&self, locator: &str) -> AppResult<()>;

    /// Stop execution for an adbot.
    async fn stop_execution(&self, owner: &str) -> AppResult<()>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
