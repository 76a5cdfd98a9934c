//! Time-driven subscription transitions.
//!
//! Each evaluation selects candidates with a store query, confirms the
//! transition with [`machine::evaluate`], and applies it with a
//! compare-and-set that also raises the matching sent flag. Only the
//! caller whose write lands sends the notification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use adpool_core::config::lifecycle::LifecycleConfig;
use adpool_core::result::AppResult;
use adpool_core::traits::automation::AutomationBackend;
use adpool_database::store::AdbotStore;
use adpool_entity::adbot::Adbot;
use adpool_entity::cron_run::RunOutcome;
use adpool_entity::notification::NotificationKind;

use super::machine::{self, Transition};
use crate::notification::NotificationService;
use crate::revocation::RevocationService;

pub(crate) const GRACE_DELETE_REASON: &str = "Subscription expired beyond grace period";

/// Counts from one evaluation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionSummary {
    /// Rows the selection query returned.
    pub candidates: usize,
    /// Rows this pass transitioned.
    pub transitioned: usize,
    /// Rows another caller transitioned first, or no longer due.
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl TransitionSummary {
    pub fn into_outcome(self) -> RunOutcome {
        let details = json!({
            "candidates": self.candidates,
            "transitioned": self.transitioned,
            "skipped": self.skipped,
        });
        RunOutcome::from_items(self.transitioned, self.errors).with_details(details)
    }
}

/// Drives pre-expiry, expiry and grace deletion.
#[derive(Debug, Clone)]
pub struct LifecycleService {
    /// Subscriptions selected and transitioned
    pub(super) adbots: Arc<dyn AdbotStore>,
    /// Stops execution after the grace period
    backend: Arc<dyn AutomationBackend>,
    /// Releases sessions after the grace period
    revocation: RevocationService,
    /// Warnings and expiry notices
    notifier: NotificationService,
    /// Warning lead time and grace period
    pub(super) config: LifecycleConfig,
}

impl LifecycleService {
    /// Creates a new lifecycle service.
    pub fn new(
        adbots: Arc<dyn AdbotStore>,
        backend: Arc<dyn AutomationBackend>,
        revocation: RevocationService,
        notifier: NotificationService,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            adbots,
            backend,
            revocation,
            notifier,
            config,
        }
    }

    pub async fn evaluate_pre_expiry(&self) -> AppResult<TransitionSummary> {
        self.evaluate_pre_expiry_at(Utc::now()).await
    }

    /// Warn owners whose subscription ends within the warning window.
    pub async fn evaluate_pre_expiry_at(&self, now: DateTime<Utc>) -> AppResult<TransitionSummary> {
        let window = self.config.pre_expiry_window();
        let due = self.adbots.list_pre_expiry_due(now, now + window).await?;
        let mut summary = TransitionSummary {
            candidates: due.len(),
            ..Default::default()
        };

        for adbot in due {
            if machine::evaluate(&adbot, now, window) != Transition::PreExpiryWarning {
                summary.skipped += 1;
                continue;
            }
            match self.adbots.mark_pre_expiry_notified(adbot.id, now).await {
                Ok(true) => {}
                Ok(false) => {
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(adbot_id = %adbot.id, error = %e, "Failed to flag pre-expiry warning");
                    summary.errors.push(format!("{}: {}", adbot.id, e.message));
                    continue;
                }
            }

            let hours = machine::hours_until(adbot.expires_at, now);
            info!(adbot_id = %adbot.id, hours_remaining = hours, "Pre-expiry warning sent");
            self.notifier
                .notify_owner(
                    &adbot,
                    NotificationKind::Warning,
                    "Subscription Expiring Soon",
                    format!(
                        "Your subscription expires in {hours} hours. Renew to avoid interruption."
                    ),
                )
                .await;
            self.notifier
                .email(
                    &adbot,
                    "pre-expiry",
                    "Your AdBot subscription expires soon",
                    json!({
                        "adbot_id": adbot.id,
                        "expires_at": adbot.expires_at,
                        "hours_remaining": hours,
                    }),
                )
                .await;
            summary.transitioned += 1;
        }

        Ok(summary)
    }

    pub async fn evaluate_expiry(&self) -> AppResult<TransitionSummary> {
        self.evaluate_expiry_at(Utc::now()).await
    }

    /// Move active subscriptions past `expires_at` to EXPIRED.
    pub async fn evaluate_expiry_at(&self, now: DateTime<Utc>) -> AppResult<TransitionSummary> {
        let window = self.config.pre_expiry_window();
        let due = self.adbots.list_expiry_due(now).await?;
        let mut summary = TransitionSummary {
            candidates: due.len(),
            ..Default::default()
        };

        for adbot in due {
            if machine::evaluate(&adbot, now, window) != Transition::Expire {
                summary.skipped += 1;
                continue;
            }
            match self.adbots.mark_expired(adbot.id, now).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(adbot_id = %adbot.id, "Expiry already applied");
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(adbot_id = %adbot.id, error = %e, "Failed to expire subscription");
                    summary.errors.push(format!("{}: {}", adbot.id, e.message));
                    continue;
                }
            }

            let grace = self.config.grace_period_hours;
            info!(
                adbot_id = %adbot.id,
                expires_at = %adbot.expires_at,
                grace_expires_at = %adbot.grace_expires_at,
                "Subscription expired"
            );
            self.notifier
                .notify_owner(
                    &adbot,
                    NotificationKind::Warning,
                    "Subscription Expired",
                    format!(
                        "Your plan has expired. You have {grace} hours to renew before your bot is permanently deleted."
                    ),
                )
                .await;
            self.notifier
                .email(
                    &adbot,
                    "expiry",
                    "Your AdBot subscription has expired",
                    json!({
                        "adbot_id": adbot.id,
                        "grace_hours": grace,
                        "grace_expires_at": adbot.grace_expires_at,
                    }),
                )
                .await;
            summary.transitioned += 1;
        }

        Ok(summary)
    }

    pub async fn evaluate_grace_revocation(&self) -> AppResult<TransitionSummary> {
        self.evaluate_grace_revocation_at(Utc::now()).await
    }

    /// Delete expired subscriptions whose grace window has passed.
    ///
    /// The status write comes first. Stopping execution and revoking
    /// sessions follow and never undo it; a failed revocation is logged
    /// and recorded for manual cleanup.
    pub async fn evaluate_grace_revocation_at(
        &self,
        now: DateTime<Utc>,
    ) -> AppResult<TransitionSummary> {
        let window = self.config.pre_expiry_window();
        let due = self.adbots.list_grace_due(now).await?;
        let mut summary = TransitionSummary {
            candidates: due.len(),
            ..Default::default()
        };

        for adbot in due {
            if machine::evaluate(&adbot, now, window) != Transition::Delete {
                summary.skipped += 1;
                continue;
            }
            match self
                .adbots
                .mark_subscription_deleted(adbot.id, GRACE_DELETE_REASON, now)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(adbot_id = %adbot.id, error = %e, "Failed to delete subscription");
                    summary.errors.push(format!("{}: {}", adbot.id, e.message));
                    continue;
                }
            }

            if let Err(e) = self.backend.stop_execution(&adbot.id.to_string()).await {
                warn!(adbot_id = %adbot.id, error = %e, "Failed to stop execution");
            }
            self.revoke_after_delete(&adbot, &mut summary).await;

            info!(adbot_id = %adbot.id, reason = GRACE_DELETE_REASON, "Subscription deleted");
            self.notifier
                .notify_owner(
                    &adbot,
                    NotificationKind::Error,
                    "Subscription Deleted",
                    "Your subscription was deleted due to non-renewal. Renewal is no longer possible.",
                )
                .await;
            self.notifier
                .email(
                    &adbot,
                    "deletion",
                    "Your AdBot was deleted due to non-renewal",
                    json!({
                        "adbot_id": adbot.id,
                        "reason": GRACE_DELETE_REASON,
                    }),
                )
                .await;
            summary.transitioned += 1;
        }

        Ok(summary)
    }

    async fn revoke_after_delete(&self, adbot: &Adbot, summary: &mut TransitionSummary) {
        match self.revocation.revoke(adbot.id).await {
            Ok(report) if !report.backend_failures.is_empty() => {
                warn!(
                    adbot_id = %adbot.id,
                    failures = report.backend_failures.len(),
                    "Sessions released but backend release failed"
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!(
                    adbot_id = %adbot.id,
                    error = %e,
                    "Revocation failed for deleted subscription, manual cleanup required"
                );
                summary
                    .errors
                    .push(format!("{}: revocation failed: {}", adbot.id, e.message));
            }
        }
    }
}
