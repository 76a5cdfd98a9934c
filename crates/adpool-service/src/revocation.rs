//! Return an adbot's sessions to the pool.
//!
//! The registry write always happens first and is never rolled back.
//! Backend release calls that follow are best-effort and their failures
//! are only reported.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use adpool_core::error::AppError;
use adpool_core::result::AppResult;
use adpool_core::traits::automation::AutomationBackend;
use adpool_database::store::{AdbotStore, SessionStore};

use crate::queue::QueueResolver;

/// What a revocation did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevocationReport {
    pub adbot_id: Uuid,
    /// Sessions moved back to UNUSED.
    pub released: Vec<Uuid>,
    /// Backend release calls that failed, as `locator: error`.
    pub backend_failures: Vec<String>,
}

impl RevocationReport {
    pub fn released_count(&self) -> usize {
        self.released.len()
    }
}

/// Returns an adbot's sessions to the unused pool.
#[derive(Debug, Clone)]
pub struct RevocationService {
    /// Sessions released back to UNUSED
    sessions: Arc<dyn SessionStore>,
    /// Owners whose holdings are re-derived
    adbots: Arc<dyn AdbotStore>,
    /// Moves the files back on disk
    backend: Arc<dyn AutomationBackend>,
    /// Hands released stock to the queue
    resolver: QueueResolver,
}

impl RevocationService {
    /// Creates a new revocation service.
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        adbots: Arc<dyn AdbotStore>,
        backend: Arc<dyn AutomationBackend>,
        resolver: QueueResolver,
    ) -> Self {
        Self {
            sessions,
            adbots,
            backend,
            resolver,
        }
    }

    /// Release every ASSIGNED session the adbot owns. Banned sessions are
    /// left alone.
    ///
    /// A live adbot is queued for its full requirement but sits out the
    /// queue pass that follows, so the freed sessions go to other waiters.
    pub async fn revoke(&self, adbot_id: Uuid) -> AppResult<RevocationReport> {
        if self.adbots.find_by_id(adbot_id).await?.is_none() {
            return Err(AppError::not_found(format!("Adbot {adbot_id} not found")));
        }

        let released = self.sessions.release_all_owned(adbot_id).await?;
        let held = i32::try_from(self.sessions.list_owned_by(adbot_id).await?.len())
            .unwrap_or(i32::MAX);
        self.adbots
            .rederive_holdings(adbot_id, held, Utc::now())
            .await?;

        let owner = adbot_id.to_string();
        let mut report = RevocationReport {
            adbot_id,
            ..Default::default()
        };
        for session in &released {
            if let Err(e) = self.backend.unassign(&session.physical_locator, &owner).await {
                warn!(
                    adbot_id = %adbot_id,
                    session_id = %session.id,
                    error = %e,
                    "Backend release failed, registry already updated"
                );
                report
                    .backend_failures
                    .push(format!("{}: {}", session.physical_locator, e.message));
            }
            report.released.push(session.id);
        }

        info!(
            adbot_id = %adbot_id,
            released = report.released.len(),
            backend_failures = report.backend_failures.len(),
            "Sessions revoked"
        );

        if !report.released.is_empty() {
            if let Err(e) = self.resolver.resolve_queued_except(adbot_id).await {
                warn!(error = %e, "Queue pass after revocation failed");
            }
        }

        Ok(report)
    }
}
