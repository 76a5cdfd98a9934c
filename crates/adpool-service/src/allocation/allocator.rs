//! Claims sessions for an adbot.
//!
//! Candidates come from the UNUSED subset oldest-first. Each one is taken
//! with a conditional `UNUSED → ASSIGNED` claim; a lost claim moves on to
//! the next candidate. A won claim must then pass the backend handshake
//! before it counts. The adbot row is updated last, guarded by the status
//! and assigned count read at the start, so two attempts on the same
//! adbot cannot both apply.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use adpool_core::error::AppError;
use adpool_core::result::AppResult;
use adpool_core::traits::automation::AutomationBackend;
use adpool_database::store::{AdbotStore, AllocationUpdate, SessionStore};
use adpool_entity::adbot::{Adbot, AdbotStatus, SubscriptionStatus};
use adpool_entity::notification::NotificationKind;
use adpool_entity::session::Session;

use super::outcome::AllocationOutcome;
use crate::inventory::LowStockAlert;
use crate::notification::NotificationService;

/// Extra candidates read per batch beyond the remaining need, so a caller
/// that loses a few races still finds free rows in the same read.
const CANDIDATE_SLACK: usize = 16;

enum Handshake {
    Confirmed,
    Invalid(String),
    Unavailable(AppError),
}

#[derive(Default)]
struct Claims {
    confirmed: Vec<Session>,
    backend_error: Option<AppError>,
}

/// Allocates sessions from the shared pool.
#[derive(Debug, Clone)]
pub struct Allocator {
    sessions: Arc<dyn SessionStore>,
    adbots: Arc<dyn AdbotStore>,
    backend: Arc<dyn AutomationBackend>,
    notifier: NotificationService,
    stock: LowStockAlert,
}

impl Allocator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        adbots: Arc<dyn AdbotStore>,
        backend: Arc<dyn AutomationBackend>,
        notifier: NotificationService,
        stock: LowStockAlert,
    ) -> Self {
        Self {
            sessions,
            adbots,
            backend,
            notifier,
            stock,
        }
    }

    /// Claim up to `count` sessions for the adbot, capped at what it is
    /// still owed. An adbot that is already whole gets a resolved no-op.
    ///
    /// Returns `ExternalService` when the backend fails mid-handshake;
    /// sessions confirmed before the failure stay assigned and the rest
    /// of the shortfall is queued.
    pub async fn allocate(&self, adbot_id: Uuid, count: i32) -> AppResult<AllocationOutcome> {
        self.allocate_expecting(adbot_id, count, None).await
    }

    /// Same as [`allocate`](Self::allocate), but refuses with `Conflict`
    /// unless the adbot is in `expected` status when read.
    pub(crate) async fn allocate_expecting(
        &self,
        adbot_id: Uuid,
        count: i32,
        expected: Option<AdbotStatus>,
    ) -> AppResult<AllocationOutcome> {
        if count < 1 {
            return Err(AppError::validation(format!(
                "Session count must be at least 1, got {count}"
            )));
        }

        let adbot = self
            .adbots
            .find_by_id(adbot_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Adbot {adbot_id} not found")))?;

        if adbot.status == AdbotStatus::Deleted
            || adbot.deleted_state
            || adbot.subscription_status == SubscriptionStatus::Deleted
        {
            return Err(AppError::validation(format!("Adbot {adbot_id} is deleted")));
        }
        if let Some(expected) = expected {
            if adbot.status != expected {
                return Err(AppError::conflict(format!(
                    "concurrent_update: adbot {adbot_id} is {}, expected {expected}",
                    adbot.status
                )));
            }
        }

        // Never claim past what the adbot is still owed: a queued adbot is
        // owed its recorded shortfall, any other one the gap to its plan.
        let owed = if adbot.is_queued() {
            adbot.missing_sessions_count
        } else {
            adbot.shortfall()
        };
        let count = count.min(owed);
        if count < 1 {
            debug!(adbot_id = %adbot.id, "Adbot already holds its sessions");
            return Ok(AllocationOutcome::new(adbot.id, Vec::new(), 0));
        }

        let now = Utc::now();
        let mut claims = Claims::default();
        if let Err(e) = self.claim_into(&adbot, count, now, &mut claims).await {
            self.roll_back(&adbot, &claims.confirmed).await;
            return Err(e);
        }

        let claimed = i32::try_from(claims.confirmed.len()).unwrap_or(i32::MAX);
        let missing = if adbot.is_queued() {
            adbot.missing_sessions_count - claimed
        } else {
            count - claimed
        };

        // Nothing gained for an adbot that is already waiting.
        if claimed == 0 && adbot.is_queued() {
            debug!(adbot_id = %adbot.id, missing, "Queued adbot unchanged");
            return match claims.backend_error {
                Some(e) => Err(e),
                None => Ok(AllocationOutcome::new(adbot.id, Vec::new(), missing)),
            };
        }

        let held = adbot.sessions_assigned + claimed;
        let reason = match &claims.backend_error {
            Some(e) => format!(
                "Automation backend unavailable: {}. Required: {}, Available: {held}, Missing: {missing}",
                e.message, adbot.required_sessions
            ),
            None => Adbot::shortfall_reason(adbot.required_sessions, held, missing),
        };

        let update = AllocationUpdate {
            adbot_id: adbot.id,
            expected_status: adbot.status,
            expected_assigned: adbot.sessions_assigned,
            claimed,
            missing,
            queued_reason: (missing > 0).then(|| reason.clone()),
            now,
        };
        match self.adbots.apply_allocation(&update).await {
            Ok(true) => {}
            Ok(false) => {
                self.roll_back(&adbot, &claims.confirmed).await;
                return Err(AppError::conflict(format!(
                    "concurrent_update: adbot {} changed during allocation",
                    adbot.id
                )));
            }
            Err(e) => {
                self.roll_back(&adbot, &claims.confirmed).await;
                return Err(e);
            }
        }

        let session_ids: Vec<Uuid> = claims.confirmed.iter().map(|s| s.id).collect();
        info!(
            adbot_id = %adbot.id,
            assigned = claimed,
            missing,
            "Allocation applied"
        );

        if missing > 0 && !adbot.is_queued() {
            self.notifier
                .alert_admins(
                    NotificationKind::Error,
                    "Order Queued: Insufficient Sessions",
                    format!("Adbot {} for owner {} was queued. {reason}", adbot.id, adbot.owner_ref),
                    Some(adbot.id),
                )
                .await;
            self.notifier
                .notify_owner(
                    &adbot,
                    NotificationKind::Warning,
                    "Order Queued",
                    format!(
                        "Your bot is waiting for {missing} more session(s). \
                         It will be set up automatically once stock is available."
                    ),
                )
                .await;
        }

        self.stock.check_quietly().await;

        match claims.backend_error {
            Some(e) => Err(e),
            None => Ok(AllocationOutcome::new(adbot.id, session_ids, missing)),
        }
    }

    async fn claim_into(
        &self,
        adbot: &Adbot,
        count: i32,
        now: DateTime<Utc>,
        claims: &mut Claims,
    ) -> AppResult<()> {
        let owner = adbot.id.to_string();
        let wanted = usize::try_from(count).unwrap_or(0);

        // A tried row can reappear only when a rival rolls its claim back,
        // so widening the window by the tried count keeps every unseen free
        // row reachable. The scan ends once a batch holds nothing new.
        let mut tried: HashSet<Uuid> = HashSet::new();
        loop {
            let remaining = wanted.saturating_sub(claims.confirmed.len());
            if remaining == 0 {
                return Ok(());
            }
            let window = remaining
                .saturating_add(CANDIDATE_SLACK)
                .saturating_add(tried.len());
            let candidates = self
                .sessions
                .list_unused(i64::try_from(window).unwrap_or(i64::MAX))
                .await?;
            let fresh: Vec<Session> = candidates
                .into_iter()
                .filter(|s| tried.insert(s.id))
                .collect();
            if fresh.is_empty() {
                return Ok(());
            }

            for session in fresh {
                if claims.confirmed.len() >= wanted {
                    return Ok(());
                }
                if !self.sessions.claim(session.id, adbot.id, now).await? {
                    debug!(session_id = %session.id, "Claim lost to a concurrent allocation");
                    continue;
                }

                match self.handshake(&session, &owner).await {
                    Handshake::Confirmed => claims.confirmed.push(session),
                    Handshake::Invalid(reason) => {
                        warn!(
                            session_id = %session.id,
                            locator = %session.physical_locator,
                            reason = %reason,
                            "Session file unusable, marking invalid"
                        );
                        self.sessions.invalidate_claim(session.id, adbot.id).await?;
                    }
                    Handshake::Unavailable(e) => {
                        warn!(
                            session_id = %session.id,
                            error = %e,
                            "Assignment handshake failed, releasing claim"
                        );
                        self.sessions.release_claim(session.id, adbot.id).await?;
                        claims.backend_error = Some(e);
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handshake(&self, session: &Session, owner: &str) -> Handshake {
        match self.backend.verify(&session.physical_locator).await {
            Ok(verdict) if verdict.exists && verdict.valid => {}
            Ok(verdict) => {
                let fallback = if verdict.exists {
                    "file invalid"
                } else {
                    "file not found"
                };
                return Handshake::Invalid(verdict.reason.unwrap_or_else(|| fallback.to_string()));
            }
            Err(e) => return Handshake::Unavailable(e),
        }
        match self.backend.assign(&session.physical_locator, owner).await {
            Ok(()) => Handshake::Confirmed,
            Err(e) => Handshake::Unavailable(e),
        }
    }

    /// Undo confirmed claims after the adbot update was refused.
    async fn roll_back(&self, adbot: &Adbot, confirmed: &[Session]) {
        let owner = adbot.id.to_string();
        for session in confirmed {
            if let Err(e) = self.sessions.release_claim(session.id, adbot.id).await {
                warn!(session_id = %session.id, error = %e, "Failed to release claim on rollback");
            }
            if let Err(e) = self.backend.unassign(&session.physical_locator, &owner).await {
                warn!(session_id = %session.id, error = %e, "Failed to unassign file on rollback");
            }
        }
    }
}
