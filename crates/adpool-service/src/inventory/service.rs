//! Pool-growing and pool-shrinking session operations.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use adpool_core::error::AppError;
use adpool_core::result::AppResult;
use adpool_core::traits::automation::AutomationBackend;
use adpool_core::types::locator;
use adpool_database::store::{AdbotStore, SessionStore};
use adpool_entity::session::{CreateSession, PoolCounts, Session};

use super::stock::LowStockAlert;
use crate::queue::{QueueResolver, ResolveSummary};

/// A newly onboarded session and the queue pass it triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardOutcome {
    pub session: Session,
    /// `None` when the queue pass failed; the session is registered regardless.
    pub queue: Option<ResolveSummary>,
}

/// Result of a bulk import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkOnboardOutcome {
    /// Sessions registered by this import, as they stand after the queue pass.
    pub created: Vec<Session>,
    /// Files already registered, left untouched.
    pub skipped: Vec<String>,
    /// Items rejected, as `locator: error`.
    pub errors: Vec<String>,
    /// Run once, and only when something was created.
    pub queue: Option<ResolveSummary>,
}

/// Session onboarding, banning and pool counts.
#[derive(Debug, Clone)]
pub struct InventoryService {
    sessions: Arc<dyn SessionStore>,
    adbots: Arc<dyn AdbotStore>,
    backend: Arc<dyn AutomationBackend>,
    /// Runs after stock is added
    resolver: QueueResolver,
    stock: LowStockAlert,
}

impl InventoryService {
    /// Creates a new inventory service.
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        adbots: Arc<dyn AdbotStore>,
        backend: Arc<dyn AutomationBackend>,
        resolver: QueueResolver,
        stock: LowStockAlert,
    ) -> Self {
        Self {
            sessions,
            adbots,
            backend,
            resolver,
            stock,
        }
    }

    /// Register a session as UNUSED, then give queued adbots a chance at it.
    pub async fn onboard_session(
        &self,
        identity_key: &str,
        physical_locator: &str,
    ) -> AppResult<OnboardOutcome> {
        let session = self
            .sessions
            .insert(&new_session(identity_key, physical_locator)?)
            .await?;
        info!(session_id = %session.id, locator = %session.physical_locator, "Session onboarded");

        let queue = self.queue_pass("onboarding").await;

        // The queue pass may have claimed it already.
        let session = self
            .sessions
            .find_by_id(session.id)
            .await?
            .unwrap_or(session);
        Ok(OnboardOutcome { session, queue })
    }

    /// Register many sessions with a single queue pass at the end.
    ///
    /// Items are independent: an invalid or failing item is reported and
    /// the rest still go in. Files that are already registered are skipped.
    pub async fn onboard_sessions(&self, batch: &[CreateSession]) -> AppResult<BulkOnboardOutcome> {
        if batch.is_empty() {
            return Err(AppError::validation("Bulk import needs at least one session"));
        }

        let mut outcome = BulkOnboardOutcome::default();
        let mut created = Vec::new();
        for item in batch {
            let data = match new_session(&item.identity_key, &item.physical_locator) {
                Ok(data) => data,
                Err(e) => {
                    outcome
                        .errors
                        .push(format!("{}: {}", item.physical_locator, e.message));
                    continue;
                }
            };
            match self.sessions.insert(&data).await {
                Ok(session) => created.push(session.id),
                Err(e) if e.is_conflict() => {
                    debug!(locator = %data.physical_locator, "Session already registered, skipping");
                    outcome.skipped.push(data.physical_locator);
                }
                Err(e) => {
                    warn!(locator = %data.physical_locator, error = %e, "Bulk insert failed");
                    outcome
                        .errors
                        .push(format!("{}: {}", data.physical_locator, e.message));
                }
            }
        }

        info!(
            created = created.len(),
            skipped = outcome.skipped.len(),
            errors = outcome.errors.len(),
            "Bulk import finished"
        );
        if created.is_empty() {
            return Ok(outcome);
        }

        outcome.queue = self.queue_pass("bulk import").await;
        for id in created {
            if let Some(session) = self.sessions.find_by_id(id).await? {
                outcome.created.push(session);
            }
        }
        Ok(outcome)
    }

    async fn queue_pass(&self, after: &str) -> Option<ResolveSummary> {
        match self.resolver.resolve_queued().await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "Queue pass after {after} failed");
                None
            }
        }
    }

    /// Ban a session from any status, taking it away from its owner.
    pub async fn ban_session(&self, session_id: Uuid, reason: &str) -> AppResult<Session> {
        if self.sessions.find_by_id(session_id).await?.is_none() {
            return Err(AppError::not_found(format!("Session {session_id} not found")));
        }

        let banned = self
            .sessions
            .ban(session_id, reason)
            .await?
            .ok_or_else(|| AppError::conflict(format!("Session {session_id} is already banned")))?;

        if let Some(owner) = banned.previous_owner {
            let held = self.sessions.list_owned_by(owner).await?.len();
            let adbot = self
                .adbots
                .rederive_holdings(owner, i32::try_from(held).unwrap_or(i32::MAX), Utc::now())
                .await?;
            if let Some(adbot) = adbot.filter(|a| a.is_queued()) {
                info!(
                    adbot_id = %owner,
                    missing = adbot.missing_sessions_count,
                    "Previous owner queued for a replacement session"
                );
                self.queue_pass("ban").await;
            }
        }
        info!(
            session_id = %session_id,
            previous_owner = ?banned.previous_owner,
            reason = %reason,
            "Session banned"
        );

        if let Err(e) = self.backend.ban(&banned.session.physical_locator).await {
            warn!(session_id = %session_id, error = %e, "Backend ban failed");
        }
        self.stock.check_quietly().await;

        Ok(banned.session)
    }

    /// Lift a ban and give queued adbots a chance at the session.
    pub async fn unban_session(&self, session_id: Uuid) -> AppResult<Session> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Session {session_id} not found")))?;

        if !self.sessions.unban(session_id).await? {
            return Err(AppError::conflict(format!(
                "Session {session_id} is not banned (status {})",
                session.status
            )));
        }
        info!(session_id = %session_id, "Session unbanned");

        if let Err(e) = self.backend.unban(&session.physical_locator).await {
            warn!(session_id = %session_id, error = %e, "Backend unban failed");
        }
        self.queue_pass("unban").await;

        self.sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Session {session_id} not found")))
    }

    pub async fn pool_counts(&self) -> AppResult<PoolCounts> {
        self.sessions.count_by_status().await
    }

    pub async fn check_low_stock(&self) -> AppResult<bool> {
        self.stock.check().await
    }
}

/// Trimmed identity and a checked locator.
fn new_session(identity_key: &str, physical_locator: &str) -> AppResult<CreateSession> {
    let identity_key = identity_key.trim();
    if identity_key.is_empty() {
        return Err(AppError::validation("Session identity must not be empty"));
    }
    locator::validate(physical_locator)?;
    Ok(CreateSession {
        identity_key: identity_key.to_string(),
        physical_locator: physical_locator.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use adpool_core::error::ErrorKind;
    use adpool_core::types::automation::ExternalLocation;
    use adpool_entity::adbot::AdbotStatus;
    use adpool_entity::session::{CreateSession, SessionStatus};

    use crate::testing::Harness;

    #[tokio::test]
    async fn test_onboarding_resolves_queue() {
        let h = Harness::new().await;
        let adbot = h.seed_adbot(1, Duration::days(30)).await;
        h.services.allocator.allocate(adbot.id, 1).await.unwrap();
        assert!(h.adbot(adbot.id).await.is_queued());

        h.backend.put_file("fresh.session", ExternalLocation::Unused).await;
        let outcome = h
            .services
            .inventory
            .onboard_session("+15550100", "fresh.session")
            .await
            .unwrap();

        assert_eq!(outcome.queue.unwrap().resolved, 1);
        assert_eq!(outcome.session.status, SessionStatus::Assigned);
        assert_eq!(outcome.session.owner_adbot_id, Some(adbot.id));
    }

    #[tokio::test]
    async fn test_onboarding_rejects_bad_input() {
        let h = Harness::new().await;
        let inventory = &h.services.inventory;

        let err = inventory.onboard_session("", "a.session").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        let err = inventory
            .onboard_session("+1555", "../a.session")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        inventory.onboard_session("+1555", "a.session").await.unwrap();
        let err = inventory.onboard_session("+1556", "a.session").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(h.counts().await.total(), 1);
    }

    fn item(identity_key: &str, physical_locator: &str) -> CreateSession {
        CreateSession {
            identity_key: identity_key.into(),
            physical_locator: physical_locator.into(),
        }
    }

    #[tokio::test]
    async fn test_bulk_import_reports_per_item_and_resolves_once() {
        let h = Harness::new().await;
        let adbot = h.seed_adbot(2, Duration::days(30)).await;
        h.services.allocator.allocate(adbot.id, 2).await.unwrap();
        h.backend.put_file("old.session", ExternalLocation::Unused).await;
        h.services
            .inventory
            .onboard_session("+15550000", "old.session")
            .await
            .unwrap();
        assert_eq!(h.adbot(adbot.id).await.missing_sessions_count, 1);
        for name in ["a.session", "b.session"] {
            h.backend.put_file(name, ExternalLocation::Unused).await;
        }

        let batch = vec![
            item("+15550001", "a.session"),
            item("+15550002", "b.session"),
            item("+15550003", "a.session"),
            item("+15550004", "old.session"),
            item("+15550005", "../escape.session"),
            item("  ", "c.session"),
        ];
        let outcome = h.services.inventory.onboard_sessions(&batch).await.unwrap();

        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.skipped, vec!["a.session", "old.session"]);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].starts_with("../escape.session: "));
        assert!(outcome.errors[1].starts_with("c.session: "));

        let queue = outcome.queue.unwrap();
        assert_eq!(queue.processed, 1);
        assert_eq!(queue.resolved, 1);
        let adbot = h.adbot(adbot.id).await;
        assert_eq!(adbot.status, AdbotStatus::Stopped);
        assert_eq!(adbot.sessions_assigned, 2);
        assert_eq!(h.counts().await.total(), 3);
    }

    #[tokio::test]
    async fn test_bulk_import_of_known_files_skips_queue_pass() {
        let h = Harness::new().await;
        let existing = h.seed_sessions(1).await;
        let inventory = &h.services.inventory;

        let outcome = inventory
            .onboard_sessions(&[item("+15550009", &existing[0].physical_locator)])
            .await
            .unwrap();
        assert!(outcome.created.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.queue.is_none());

        let err = inventory.onboard_sessions(&[]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_ban_takes_session_from_owner() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(2).await;
        let adbot = h.seed_adbot(2, Duration::days(30)).await;
        h.services.allocator.allocate(adbot.id, 2).await.unwrap();

        let banned = h
            .services
            .inventory
            .ban_session(sessions[0].id, "reported")
            .await
            .unwrap();

        assert_eq!(banned.status, SessionStatus::Banned);
        assert!(banned.owner_adbot_id.is_none());
        assert_eq!(banned.banned_reason.as_deref(), Some("reported"));
        let owner = h.adbot(adbot.id).await;
        assert_eq!(owner.sessions_assigned, 1);
        assert_eq!(owner.status, AdbotStatus::Queued);
        assert_eq!(owner.missing_sessions_count, 1);
        assert_eq!(
            h.backend.location(&sessions[0].physical_locator).await,
            Some(ExternalLocation::Banned)
        );

        let err = h
            .services
            .inventory
            .ban_session(sessions[0].id, "again")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_banned_owner_gets_a_spare_session() {
        let h = Harness::new().await;
        h.seed_sessions(3).await;
        let adbot = h.seed_adbot(2, Duration::days(30)).await;
        let outcome = h.services.allocator.allocate(adbot.id, 2).await.unwrap();

        h.services
            .inventory
            .ban_session(outcome.assigned_session_ids[0], "reported")
            .await
            .unwrap();

        let adbot = h.adbot(adbot.id).await;
        assert_eq!(adbot.status, AdbotStatus::Stopped);
        assert_eq!(adbot.sessions_assigned, 2);
        assert_eq!(adbot.missing_sessions_count, 0);
        assert_eq!(h.owned_by(adbot.id).await.len(), 2);
        assert_eq!(h.counts().await.unused, 0);
    }

    #[tokio::test]
    async fn test_unban_returns_session_and_resolves_queue() {
        let h = Harness::new().await;
        let sessions = h.seed_sessions(1).await;
        h.services
            .inventory
            .ban_session(sessions[0].id, "review")
            .await
            .unwrap();
        let adbot = h.seed_adbot(1, Duration::days(30)).await;
        h.services.allocator.allocate(adbot.id, 1).await.unwrap();
        assert!(h.adbot(adbot.id).await.is_queued());

        let session = h
            .services
            .inventory
            .unban_session(sessions[0].id)
            .await
            .unwrap();

        assert_eq!(session.status, SessionStatus::Assigned);
        assert!(!h.adbot(adbot.id).await.is_queued());

        let err = h
            .services
            .inventory
            .unban_session(sessions[0].id)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_low_stock_alert() {
        let h = Harness::new().await;
        h.seed_sessions(2).await;

        assert!(h.services.inventory.check_low_stock().await.unwrap());
        assert!(h.admin_titles().await.iter().any(|t| t == "Low Session Stock"));
    }
}
