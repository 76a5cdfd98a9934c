//! Adbot entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use adpool_core::result::AppResult;

use super::state::AdbotState;
use super::status::{AdbotStatus, SubscriptionStatus};

/// A tenant's paid execution unit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Adbot {
    /// Unique adbot identifier.
    pub id: Uuid,
    /// Reference to the owning tenant (user id in the account system).
    pub owner_ref: String,
    /// Number of sessions the plan requires. Always at least 1.
    pub required_sessions: i32,
    /// Number of sessions currently held.
    pub sessions_assigned: i32,
    /// Stored discriminant of the tagged state.
    pub status: AdbotStatus,
    /// Subscription lifecycle status.
    pub subscription_status: SubscriptionStatus,
    /// End of the paid period.
    pub expires_at: DateTime<Utc>,
    /// End of the grace window after expiry.
    pub grace_expires_at: DateTime<Utc>,
    /// Sessions still owed. Positive exactly when queued.
    pub missing_sessions_count: i32,
    /// Human-readable shortfall description.
    pub queued_reason: Option<String>,
    /// When the adbot entered the queue.
    pub queued_at: Option<DateTime<Utc>>,
    /// Reason for suspension or freeze.
    pub status_reason: Option<String>,
    pub pre_expiry_notification_sent: bool,
    pub expiry_notification_sent: bool,
    pub deletion_notification_sent: bool,
    /// Soft-deleted by an administrator and still recoverable.
    pub deleted_state: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// When a soft-deleted adbot becomes eligible for hard deletion.
    pub deletion_scheduled_at: Option<DateTime<Utc>>,
    pub delete_reason: Option<String>,
    /// Administrator who soft-deleted the adbot.
    pub deleted_by: Option<String>,
    /// When the adbot was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Adbot {
    /// Tagged state derived from the stored columns.
    pub fn state(&self) -> AppResult<AdbotState> {
        AdbotState::from_columns(
            self.status,
            self.missing_sessions_count,
            self.queued_reason.as_deref(),
            self.status_reason.as_deref(),
            self.delete_reason.as_deref(),
        )
    }

    pub fn is_queued(&self) -> bool {
        self.status == AdbotStatus::Queued
    }

    /// Whether a soft delete can still be undone at `now`.
    pub fn is_recoverable(&self, now: DateTime<Utc>) -> bool {
        self.deleted_state
            && self.subscription_status != SubscriptionStatus::Deleted
            && self.deletion_scheduled_at.is_some_and(|at| now < at)
    }

    /// Sessions still needed to reach `required_sessions`.
    pub fn shortfall(&self) -> i32 {
        (self.required_sessions - self.sessions_assigned).max(0)
    }

    /// Queue reason recorded for a shortfall.
    pub fn shortfall_reason(required: i32, held: i32, missing: i32) -> String {
        format!("Insufficient sessions. Required: {required}, Available: {held}, Missing: {missing}")
    }

    /// Re-derive the queue columns after sessions left outside allocation.
    ///
    /// Stopped, active and queued adbots that are not deleted are queued
    /// for the new shortfall, or leave the queue once whole. Suspended,
    /// frozen and deleted adbots only take the new count.
    pub fn apply_holdings(&mut self, held: i32, now: DateTime<Utc>) {
        self.sessions_assigned = held.max(0);
        self.updated_at = now;

        let queueable = !self.deleted_state
            && self.subscription_status != SubscriptionStatus::Deleted
            && matches!(
                self.status,
                AdbotStatus::Stopped | AdbotStatus::Active | AdbotStatus::Queued
            );
        if !queueable {
            return;
        }

        let missing = self.shortfall();
        if missing > 0 {
            self.status = AdbotStatus::Queued;
            self.missing_sessions_count = missing;
            self.queued_reason = Some(Self::shortfall_reason(
                self.required_sessions,
                self.sessions_assigned,
                missing,
            ));
            self.queued_at = self.queued_at.or(Some(now));
        } else if self.status == AdbotStatus::Queued {
            self.status = AdbotStatus::Stopped;
            self.missing_sessions_count = 0;
            self.queued_reason = None;
            self.queued_at = None;
        }
    }
}

/// Data required to create an adbot at purchase completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAdbot {
    pub owner_ref: String,
    pub required_sessions: i32,
    pub expires_at: DateTime<Utc>,
    pub grace_expires_at: DateTime<Utc>,
}
