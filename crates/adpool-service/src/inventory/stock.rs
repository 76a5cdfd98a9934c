//! Low stock alerting.

use std::sync::Arc;

use tracing::{error, warn};

use adpool_core::result::AppResult;
use adpool_database::store::SessionStore;
use adpool_entity::notification::NotificationKind;
use adpool_entity::session::PoolCounts;

use crate::notification::NotificationService;

/// Raises an operator alert when the UNUSED pool runs low.
#[derive(Debug, Clone)]
pub struct LowStockAlert {
    sessions: Arc<dyn SessionStore>,
    notifier: NotificationService,
    threshold: i64,
}

impl LowStockAlert {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        notifier: NotificationService,
        threshold: i64,
    ) -> Self {
        Self {
            sessions,
            notifier,
            threshold,
        }
    }

    /// Check the pool and alert if it is at or below the threshold.
    /// Returns whether an alert was raised.
    pub async fn check(&self) -> AppResult<bool> {
        let counts: PoolCounts = self.sessions.count_by_status().await?;
        if counts.unused > self.threshold {
            return Ok(false);
        }

        warn!(unused = counts.unused, threshold = self.threshold, "Session stock is low");
        self.notifier
            .alert_admins(
                NotificationKind::Warning,
                "Low Session Stock",
                format!(
                    "Session stock is low! Only {} unused sessions remaining (threshold {}).",
                    counts.unused, self.threshold
                ),
                None,
            )
            .await;
        Ok(true)
    }

    /// Run the check after an allocation, never failing the caller.
    pub async fn check_quietly(&self) {
        if let Err(e) = self.check().await {
            error!(error = %e, "Low stock check failed");
        }
    }
}
