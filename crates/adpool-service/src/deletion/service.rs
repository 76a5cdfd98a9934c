//! Soft delete service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use adpool_core::config::lifecycle::LifecycleConfig;
use adpool_core::error::AppError;
use adpool_core::result::AppResult;
use adpool_core::traits::automation::AutomationBackend;
use adpool_database::store::{AdbotStore, SoftDeletion};
use adpool_entity::adbot::{Adbot, AdbotStatus, SubscriptionStatus};
use adpool_entity::cron_run::RunOutcome;
use adpool_entity::notification::NotificationKind;

use crate::allocation::{AllocationOutcome, Allocator};
use crate::context::Actor;
use crate::notification::NotificationService;
use crate::revocation::{RevocationReport, RevocationService};

const DEFAULT_REASON: &str = "Deleted by administrator";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftDeleteOutcome {
    pub adbot: Adbot,
    pub revocation: Option<RevocationReport>,
    /// Set when sessions could not be released; the sweep retries.
    pub revocation_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverOutcome {
    pub adbot: Adbot,
    pub allocation: Option<AllocationOutcome>,
    pub allocation_error: Option<String>,
}

/// Result of one permanent-delete sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurgeSummary {
    pub deleted: Vec<Uuid>,
    pub errors: Vec<String>,
}

impl PurgeSummary {
    pub fn into_outcome(self) -> RunOutcome {
        let details = json!({ "deleted": self.deleted });
        RunOutcome::from_items(self.deleted.len(), self.errors).with_details(details)
    }
}

/// Soft delete, recovery and the permanent-delete sweep.
#[derive(Debug, Clone)]
pub struct DeletionService {
    /// Adbots marked, recovered and purged
    adbots: Arc<dyn AdbotStore>,
    /// Stops execution on delete and purge
    backend: Arc<dyn AutomationBackend>,
    /// Releases sessions on delete
    revocation: RevocationService,
    /// Re-serves a recovered adbot
    allocator: Allocator,
    /// Deletion and recovery notices
    notifier: NotificationService,
    /// Retention before the purge
    config: LifecycleConfig,
}

impl DeletionService {
    /// Creates a new deletion service.
    pub fn new(
        adbots: Arc<dyn AdbotStore>,
        backend: Arc<dyn AutomationBackend>,
        revocation: RevocationService,
        allocator: Allocator,
        notifier: NotificationService,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            adbots,
            backend,
            revocation,
            allocator,
            notifier,
            config,
        }
    }

    async fn find(&self, adbot_id: Uuid) -> AppResult<Adbot> {
        self.adbots
            .find_by_id(adbot_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Adbot {adbot_id} not found")))
    }

    pub async fn soft_delete(
        &self,
        adbot_id: Uuid,
        reason: &str,
        actor: &Actor,
    ) -> AppResult<SoftDeleteOutcome> {
        self.soft_delete_at(adbot_id, reason, actor, Utc::now()).await
    }

    /// Mark the adbot deleted but recoverable, then release its sessions.
    ///
    /// The subscription status is left as it was.
    pub async fn soft_delete_at(
        &self,
        adbot_id: Uuid,
        reason: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> AppResult<SoftDeleteOutcome> {
        let adbot = self.find(adbot_id).await?;
        if adbot.deleted_state {
            return Err(AppError::conflict(format!(
                "Adbot {adbot_id} is already soft-deleted"
            )));
        }
        if adbot.status == AdbotStatus::Deleted {
            return Err(AppError::conflict(format!("Adbot {adbot_id} is already deleted")));
        }

        let reason = match reason.trim() {
            "" => DEFAULT_REASON,
            r => r,
        };
        let scheduled_at = now + self.config.soft_delete_retention();
        let deletion = SoftDeletion {
            reason: reason.to_string(),
            deleted_by: Some(actor.reference()),
            scheduled_at,
            now,
        };
        if !self.adbots.soft_delete(adbot_id, &deletion).await? {
            return Err(AppError::conflict(format!(
                "concurrent_update: adbot {adbot_id} changed before soft delete"
            )));
        }
        info!(
            adbot_id = %adbot_id,
            deleted_by = %actor.reference(),
            scheduled_at = %scheduled_at,
            "Adbot soft-deleted"
        );

        if let Err(e) = self.backend.stop_execution(&adbot_id.to_string()).await {
            warn!(adbot_id = %adbot_id, error = %e, "Failed to stop execution");
        }
        let (revocation, revocation_error) = match self.revocation.revoke(adbot_id).await {
            Ok(report) => (Some(report), None),
            Err(e) => {
                error!(adbot_id = %adbot_id, error = %e, "Revocation after soft delete failed");
                (None, Some(e.message))
            }
        };

        self.notifier
            .notify_owner(
                &adbot,
                NotificationKind::Warning,
                "AdBot Deleted",
                format!(
                    "Your bot was deleted by an administrator. It can be recovered until {}.",
                    scheduled_at.format("%Y-%m-%d %H:%M UTC")
                ),
            )
            .await;

        Ok(SoftDeleteOutcome {
            adbot: self.find(adbot_id).await?,
            revocation,
            revocation_error,
        })
    }

    pub async fn recover(&self, adbot_id: Uuid) -> AppResult<RecoverOutcome> {
        self.recover_at(adbot_id, Utc::now()).await
    }

    /// Undo a soft delete inside its window and allocate the full session
    /// count again. The adbot may come back QUEUED.
    pub async fn recover_at(&self, adbot_id: Uuid, now: DateTime<Utc>) -> AppResult<RecoverOutcome> {
        let adbot = self.find(adbot_id).await?;
        if !adbot.deleted_state {
            return Err(AppError::validation(format!(
                "Adbot {adbot_id} is not soft-deleted"
            )));
        }
        if adbot.subscription_status == SubscriptionStatus::Deleted {
            return Err(AppError::validation(format!(
                "Subscription of adbot {adbot_id} was deleted and cannot be recovered"
            )));
        }
        if !adbot.is_recoverable(now) {
            return Err(AppError::validation(format!(
                "Recovery window for adbot {adbot_id} has elapsed"
            )));
        }

        if !self.adbots.recover(adbot_id, now).await? {
            return Err(AppError::conflict(format!(
                "concurrent_update: adbot {adbot_id} changed before recovery"
            )));
        }
        info!(adbot_id = %adbot_id, "Adbot recovered");

        let (allocation, allocation_error) = match self
            .allocator
            .allocate(adbot_id, adbot.required_sessions)
            .await
        {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                warn!(adbot_id = %adbot_id, error = %e, "Allocation after recovery failed");
                (None, Some(e.message))
            }
        };

        self.notifier
            .notify_owner(
                &adbot,
                NotificationKind::Success,
                "AdBot Recovered",
                "Your bot has been restored by an administrator.",
            )
            .await;

        Ok(RecoverOutcome {
            adbot: self.find(adbot_id).await?,
            allocation,
            allocation_error,
        })
    }

    /// Operator override: hard-delete one soft-deleted adbot now, without
    /// waiting for its recovery window. Sessions are released first and the
    /// row stays if that fails.
    pub async fn permanently_delete(&self, adbot_id: Uuid) -> AppResult<RevocationReport> {
        let adbot = self.find(adbot_id).await?;
        if !adbot.deleted_state {
            return Err(AppError::validation(format!(
                "Adbot {adbot_id} must be soft-deleted before permanent deletion"
            )));
        }

        let revocation = self.revocation.revoke(adbot_id).await?;
        if let Err(e) = self.backend.stop_execution(&adbot_id.to_string()).await {
            warn!(adbot_id = %adbot_id, error = %e, "Failed to stop execution");
        }

        if !self.adbots.hard_delete(adbot_id, None).await? {
            return Err(AppError::conflict(format!(
                "concurrent_update: adbot {adbot_id} changed before permanent deletion"
            )));
        }
        info!(
            adbot_id = %adbot_id,
            released = revocation.released_count(),
            "Adbot permanently deleted by operator"
        );
        Ok(revocation)
    }

    pub async fn permanently_delete_expired(&self) -> AppResult<PurgeSummary> {
        self.permanently_delete_expired_at(Utc::now()).await
    }

    /// Hard-delete soft-deleted adbots whose recovery window has passed.
    pub async fn permanently_delete_expired_at(&self, now: DateTime<Utc>) -> AppResult<PurgeSummary> {
        let due = self.adbots.list_soft_deleted_due(now).await?;
        let mut summary = PurgeSummary::default();

        for adbot in due {
            if let Err(e) = self.revocation.revoke(adbot.id).await {
                error!(adbot_id = %adbot.id, error = %e, "Revocation before hard delete failed");
                summary
                    .errors
                    .push(format!("{}: revocation failed: {}", adbot.id, e.message));
                continue;
            }
            if let Err(e) = self.backend.stop_execution(&adbot.id.to_string()).await {
                warn!(adbot_id = %adbot.id, error = %e, "Failed to stop execution");
            }

            match self.adbots.hard_delete(adbot.id, Some(now)).await {
                Ok(true) => {
                    info!(adbot_id = %adbot.id, "Adbot permanently deleted");
                    summary.deleted.push(adbot.id);
                }
                Ok(false) => {}
                Err(e) => {
                    error!(adbot_id = %adbot.id, error = %e, "Hard delete failed");
                    summary.errors.push(format!("{}: {}", adbot.id, e.message));
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use adpool_core::error::ErrorKind;
    use adpool_entity::adbot::{AdbotStatus, SubscriptionStatus};
    use adpool_entity::session::SessionStatus;

    use crate::context::Actor;
    use crate::testing::Harness;

    fn admin() -> Actor {
        Actor::Admin {
            subject: "ops-1".into(),
        }
    }

    #[tokio::test]
    async fn test_soft_delete_releases_and_keeps_subscription() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(2).await;
        let adbot = h.seed_adbot(2, Duration::days(30)).await;
        h.services.allocator.allocate(adbot.id, 2).await.unwrap();
        let now = Utc::now();

        let outcome = h
            .services
            .deletion
            .soft_delete_at(adbot.id, "abuse", &admin(), now)
            .await
            .unwrap();

        assert_eq!(outcome.revocation.unwrap().released_count(), 2);
        let deleted = outcome.adbot;
        assert_eq!(deleted.status, AdbotStatus::Deleted);
        assert!(deleted.deleted_state);
        assert_eq!(deleted.subscription_status, SubscriptionStatus::Active);
        assert_eq!(deleted.deleted_by.as_deref(), Some("ops-1"));
        assert_eq!(deleted.deletion_scheduled_at, Some(now + Duration::days(10)));
        for s in &sessions {
            assert_eq!(h.session(s.id).await.status, SessionStatus::Unused);
        }

        let err = h
            .services
            .deletion
            .soft_delete(adbot.id, "again", &admin())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_recover_within_window_reallocates() {
        let h = Harness::new().await;
        h.seed_sessions(1).await;
        let adbot = h.seed_adbot(2, Duration::days(30)).await;
        h.services.allocator.allocate(adbot.id, 2).await.unwrap();
        h.services
            .deletion
            .soft_delete(adbot.id, "mistake", &admin())
            .await
            .unwrap();

        let outcome = h.services.deletion.recover(adbot.id).await.unwrap();

        assert!(!outcome.adbot.deleted_state);
        assert!(outcome.adbot.deletion_scheduled_at.is_none());
        let allocation = outcome.allocation.unwrap();
        assert_eq!(allocation.assigned_count, 1);
        assert_eq!(allocation.missing_count, 1);
        assert_eq!(outcome.adbot.status, AdbotStatus::Queued);
        assert_eq!(outcome.adbot.sessions_assigned, 1);
    }

    #[tokio::test]
    async fn test_recover_counts_sessions_still_owned() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(3).await;
        let adbot = h.seed_adbot(2, Duration::days(30)).await;
        h.services
            .deletion
            .soft_delete(adbot.id, "mistake", &admin())
            .await
            .unwrap();
        // A row left behind by a revocation that never completed.
        assert!(
            h.stores
                .sessions
                .claim(sessions[0].id, adbot.id, Utc::now())
                .await
                .unwrap()
        );

        let outcome = h.services.deletion.recover(adbot.id).await.unwrap();

        assert_eq!(outcome.allocation.unwrap().assigned_count, 1);
        assert_eq!(outcome.adbot.status, AdbotStatus::Stopped);
        assert_eq!(outcome.adbot.sessions_assigned, 2);
        assert_eq!(h.owned_by(adbot.id).await.len(), 2);
        assert_eq!(h.counts().await.unused, 1);
    }

    #[tokio::test]
    async fn test_recover_refusals() {
        let h = Harness::new().await;
        let adbot = h.seed_adbot(1, Duration::days(30)).await;

        let err = h.services.deletion.recover(adbot.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        let err = h
            .services
            .deletion
            .recover(uuid::Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let now = Utc::now();
        h.services
            .deletion
            .soft_delete_at(adbot.id, "late", &admin(), now)
            .await
            .unwrap();
        let err = h
            .services
            .deletion
            .recover_at(adbot.id, now + Duration::days(11))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_due_adbots() {
        let h = Harness::new().await;
        let due = h.seed_adbot(1, Duration::days(30)).await;
        let fresh = h.seed_adbot(1, Duration::days(30)).await;
        let now = Utc::now();
        h.services
            .deletion
            .soft_delete_at(due.id, "old", &admin(), now - Duration::days(11))
            .await
            .unwrap();
        h.services
            .deletion
            .soft_delete_at(fresh.id, "new", &admin(), now)
            .await
            .unwrap();

        let summary = h
            .services
            .deletion
            .permanently_delete_expired_at(now)
            .await
            .unwrap();

        assert_eq!(summary.deleted, vec![due.id]);
        assert!(h.find_adbot(due.id).await.is_none());
        assert!(h.find_adbot(fresh.id).await.is_some());

        let again = h
            .services
            .deletion
            .permanently_delete_expired_at(now)
            .await
            .unwrap();
        assert!(again.deleted.is_empty());
        assert!(again.errors.is_empty());
    }

    #[tokio::test]
    async fn test_permanent_delete_requires_soft_delete_and_releases_leftovers() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(1).await;
        let adbot = h.seed_adbot(1, Duration::days(30)).await;

        let err = h
            .services
            .deletion
            .permanently_delete(adbot.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(h.find_adbot(adbot.id).await.is_some());

        h.services
            .deletion
            .soft_delete(adbot.id, "fraud", &admin())
            .await
            .unwrap();
        // A claim that slipped in after the soft delete released everything.
        h.stores
            .sessions
            .claim(sessions[0].id, adbot.id, Utc::now())
            .await
            .unwrap();

        let report = h.services.deletion.permanently_delete(adbot.id).await.unwrap();

        assert_eq!(report.released, vec![sessions[0].id]);
        assert!(h.find_adbot(adbot.id).await.is_none());
        assert_eq!(h.session(sessions[0].id).await.status, SessionStatus::Unused);

        let err = h
            .services
            .deletion
            .permanently_delete(adbot.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
