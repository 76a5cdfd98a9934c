//! Queue resolver.
//!
//! Invoked after every pool-growing event, by operators, and by the
//! periodic queue sweep. Each attempt goes through the allocator with the
//! expectation that the adbot is still QUEUED, so a concurrent resolution
//! of the same adbot surfaces as a conflict instead of a double apply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use adpool_core::error::AppError;
use adpool_core::result::AppResult;
use adpool_database::store::{AdbotStore, SessionStore};
use adpool_entity::adbot::{Adbot, AdbotStatus};
use adpool_entity::notification::NotificationKind;

use super::stats::QueueStats;
use crate::allocation::{AllocationOutcome, Allocator};
use crate::notification::NotificationService;

/// Counts from one pass over the queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveSummary {
    /// Queued adbots attempted.
    pub processed: usize,
    /// Adbots that left the queue.
    pub resolved: usize,
    /// Adbots that gained sessions but are still short.
    pub partial: usize,
    /// Adbots that gained nothing.
    pub unchanged: usize,
    /// Adbots changed by someone else during the attempt.
    pub conflicts: usize,
    pub errors: Vec<String>,
}

impl ResolveSummary {
    /// Adbots that received at least one session.
    pub fn progressed(&self) -> usize {
        self.resolved + self.partial
    }
}

/// Serves queued adbots from the unused pool, oldest first.
#[derive(Debug, Clone)]
pub struct QueueResolver {
    /// Queued adbots and their holdings
    adbots: Arc<dyn AdbotStore>,
    /// Unused stock the passes draw from
    sessions: Arc<dyn SessionStore>,
    /// Claims sessions for one adbot at a time
    allocator: Allocator,
    /// Tells owners their adbot left the queue
    notifier: NotificationService,
}

impl QueueResolver {
    /// Creates a new queue resolver.
    pub fn new(
        adbots: Arc<dyn AdbotStore>,
        sessions: Arc<dyn SessionStore>,
        allocator: Allocator,
        notifier: NotificationService,
    ) -> Self {
        Self {
            adbots,
            sessions,
            allocator,
            notifier,
        }
    }

    /// Attempt every queued adbot, oldest queue entry first.
    ///
    /// Stops early once the pool has no UNUSED sessions left. Run twice
    /// with no pool change in between, the second pass writes nothing.
    pub async fn resolve_queued(&self) -> AppResult<ResolveSummary> {
        self.pass(None).await
    }

    /// Queue pass that leaves `adbot_id` waiting for the next pool event.
    pub(crate) async fn resolve_queued_except(&self, adbot_id: Uuid) -> AppResult<ResolveSummary> {
        self.pass(Some(adbot_id)).await
    }

    async fn pass(&self, skip: Option<Uuid>) -> AppResult<ResolveSummary> {
        let queued: Vec<Adbot> = self
            .adbots
            .list_queued()
            .await?
            .into_iter()
            .filter(|a| Some(a.id) != skip)
            .collect();
        let mut summary = ResolveSummary::default();
        if queued.is_empty() {
            debug!("Queue is empty");
            return Ok(summary);
        }

        for adbot in queued {
            if self.sessions.count_by_status().await?.unused == 0 {
                debug!(adbot_id = %adbot.id, "Pool exhausted, stopping queue pass");
                break;
            }
            summary.processed += 1;

            match self.attempt(&adbot).await {
                Ok(outcome) if outcome.resolved => summary.resolved += 1,
                Ok(outcome) if outcome.assigned_count > 0 => summary.partial += 1,
                Ok(_) => summary.unchanged += 1,
                Err(e) if e.is_conflict() => {
                    debug!(adbot_id = %adbot.id, "Queued adbot changed concurrently, skipping");
                    summary.conflicts += 1;
                }
                Err(e) => {
                    warn!(adbot_id = %adbot.id, error = %e, "Failed to resolve queued adbot");
                    summary.errors.push(format!("{}: {}", adbot.id, e.message));
                }
            }
        }

        info!(
            processed = summary.processed,
            resolved = summary.resolved,
            partial = summary.partial,
            conflicts = summary.conflicts,
            errors = summary.errors.len(),
            "Queue pass finished"
        );
        Ok(summary)
    }

    /// Operator override for one adbot.
    pub async fn resolve_one(&self, adbot_id: Uuid) -> AppResult<AllocationOutcome> {
        let adbot = self
            .adbots
            .find_by_id(adbot_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Adbot {adbot_id} not found")))?;

        if !adbot.is_queued() {
            return Err(AppError::conflict(format!(
                "concurrent_update: adbot {adbot_id} is not queued (status {})",
                adbot.status
            )));
        }

        self.attempt(&adbot).await
    }

    /// Queued adbots, oldest queue entry first.
    pub async fn queued(&self) -> AppResult<Vec<Adbot>> {
        self.adbots.list_queued().await
    }

    pub async fn queue_stats(&self) -> AppResult<QueueStats> {
        let queued = self.adbots.list_queued().await?;
        Ok(QueueStats::from_queued(&queued))
    }

    async fn attempt(&self, adbot: &Adbot) -> AppResult<AllocationOutcome> {
        let outcome = self
            .allocator
            .allocate_expecting(adbot.id, adbot.missing_sessions_count, Some(AdbotStatus::Queued))
            .await?;

        if outcome.resolved {
            info!(
                adbot_id = %adbot.id,
                assigned = outcome.assigned_count,
                "Queued adbot resolved"
            );
            self.notifier
                .alert_admins(
                    NotificationKind::Info,
                    "Queue Item Resolved",
                    format!(
                        "Adbot {} has been resolved. {} sessions assigned. Status changed to STOPPED.",
                        adbot.id, outcome.assigned_count
                    ),
                    Some(adbot.id),
                )
                .await;
            self.notifier
                .notify_owner(
                    adbot,
                    NotificationKind::Success,
                    "Order Ready",
                    format!(
                        "All {} sessions for your bot are now assigned. You can start it.",
                        adbot.required_sessions
                    ),
                )
                .await;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use adpool_core::error::ErrorKind;
    use adpool_entity::adbot::AdbotStatus;

    use crate::testing::Harness;

    #[tokio::test]
    async fn test_new_stock_resolves_oldest_first() {
        let h = Harness::new().await;
        let older = h.seed_adbot(2, Duration::days(30)).await;
        let newer = h.seed_adbot(2, Duration::days(30)).await;
        h.services.allocator.allocate(older.id, 2).await.unwrap();
        h.services.allocator.allocate(newer.id, 2).await.unwrap();
        assert!(h.adbot(older.id).await.is_queued());

        h.seed_sessions(3).await;
        let summary = h.services.resolver.resolve_queued().await.unwrap();

        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.partial, 1);
        let older = h.adbot(older.id).await;
        assert_eq!(older.status, AdbotStatus::Stopped);
        assert_eq!(older.missing_sessions_count, 0);
        assert!(older.queued_reason.is_none());
        let newer = h.adbot(newer.id).await;
        assert_eq!(newer.status, AdbotStatus::Queued);
        assert_eq!(newer.missing_sessions_count, 1);
        assert_eq!(newer.sessions_assigned, 1);
        assert!(h.admin_titles().await.iter().any(|t| t == "Queue Item Resolved"));
    }

    #[tokio::test]
    async fn test_second_pass_changes_nothing() {
        let h = Harness::new().await;
        h.seed_sessions(1).await;
        let adbot = h.seed_adbot(3, Duration::days(30)).await;
        h.services.allocator.allocate(adbot.id, 3).await.unwrap();

        let first = h.adbot(adbot.id).await;
        let notes_before = h.notification_count().await;

        let summary = h.services.resolver.resolve_queued().await.unwrap();
        assert_eq!(summary.progressed(), 0);
        let summary = h.services.resolver.resolve_queued().await.unwrap();
        assert_eq!(summary.progressed(), 0);

        let second = h.adbot(adbot.id).await;
        assert_eq!(second.updated_at, first.updated_at);
        assert_eq!(second.queued_reason, first.queued_reason);
        assert_eq!(h.notification_count().await, notes_before);
    }

    #[tokio::test]
    async fn test_resolve_one_rejects_unqueued_and_unknown() {
        let h = Harness::new().await;
        h.seed_sessions(2).await;
        let adbot = h.seed_adbot(1, Duration::days(30)).await;
        h.services.allocator.allocate(adbot.id, 1).await.unwrap();

        let err = h.services.resolver.resolve_one(adbot.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(err.message.starts_with("concurrent_update"));

        let err = h
            .services
            .resolver
            .resolve_one(uuid::Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_concurrent_resolve_one_applies_once() {
        let h = Harness::new().await;
        let adbot = h.seed_adbot(2, Duration::days(30)).await;
        h.services.allocator.allocate(adbot.id, 2).await.unwrap();
        h.seed_sessions(4).await;

        let resolver = h.services.resolver.clone();
        let (a, b) = tokio::join!(resolver.resolve_one(adbot.id), resolver.resolve_one(adbot.id));

        let wins = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        let loser = if a.is_ok() { b } else { a };
        assert_eq!(loser.unwrap_err().kind, ErrorKind::Conflict);

        let adbot = h.adbot(adbot.id).await;
        assert_eq!(adbot.sessions_assigned, 2);
        assert_eq!(h.owned_by(adbot.id).await.len(), 2);
        assert_eq!(h.counts().await.unused, 2);
    }

    #[tokio::test]
    async fn test_queue_stats() {
        let h = Harness::new().await;
        let a = h.seed_adbot(2, Duration::days(30)).await;
        let b = h.seed_adbot(3, Duration::days(30)).await;
        h.services.allocator.allocate(a.id, 2).await.unwrap();
        h.services.allocator.allocate(b.id, 3).await.unwrap();

        let stats = h.services.resolver.queue_stats().await.unwrap();
        assert_eq!(stats.total_queued, 2);
        assert_eq!(stats.total_missing_sessions, 5);
        assert!(stats.oldest_queued_at.is_some());
    }

    #[tokio::test]
    async fn test_queued_list_is_oldest_first() {
        let h = Harness::new().await;
        let first = h.seed_adbot(1, Duration::days(30)).await;
        let second = h.seed_adbot(2, Duration::days(30)).await;
        let served = h.seed_adbot(1, Duration::days(30)).await;
        h.services.allocator.allocate(first.id, 1).await.unwrap();
        h.services.allocator.allocate(second.id, 2).await.unwrap();
        h.seed_sessions(1).await;
        h.services.allocator.allocate(served.id, 1).await.unwrap();

        let queued: Vec<_> = h
            .services
            .resolver
            .queued()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();

        assert_eq!(queued, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_queue_pass_can_leave_one_adbot_waiting() {
        let h = Harness::new().await;
        let held_back = h.seed_adbot(1, Duration::days(30)).await;
        let other = h.seed_adbot(1, Duration::days(30)).await;
        h.services.allocator.allocate(held_back.id, 1).await.unwrap();
        h.services.allocator.allocate(other.id, 1).await.unwrap();
        h.seed_sessions(2).await;

        let summary = h
            .services
            .resolver
            .resolve_queued_except(held_back.id)
            .await
            .unwrap();

        assert_eq!(summary.processed, 1);
        assert!(h.adbot(held_back.id).await.is_queued());
        assert!(!h.adbot(other.id).await.is_queued());
    }
}
