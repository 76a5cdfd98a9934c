//! Store traits consumed by the service layer.
//!
//! Every method that changes a contended row is a compare-and-set: it
//! names the prior state it expects and reports whether exactly one row
//! matched. A `false` return means another caller got there first.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use adpool_core::result::AppResult;
use adpool_entity::adbot::{Adbot, AdbotStatus, CreateAdbot};
use adpool_entity::cron_run::CronRun;
use adpool_entity::notification::{NewNotification, Notification};
use adpool_entity::session::{CreateSession, PoolCounts, Session, SessionStatus};

/// Adbot row change after an allocation attempt.
///
/// Applied only if the row still has `expected_status` and
/// `expected_assigned`; this is the guard that makes a concurrent
/// resolution of the same adbot lose visibly.
#[derive(Debug, Clone)]
pub struct AllocationUpdate {
    pub adbot_id: Uuid,
    pub expected_status: AdbotStatus,
    pub expected_assigned: i32,
    /// Sessions claimed by this attempt.
    pub claimed: i32,
    /// Shortfall after this attempt. Positive queues the adbot.
    pub missing: i32,
    pub queued_reason: Option<String>,
    pub now: DateTime<Utc>,
}

/// Session row returned by a ban, with the owner it had before.
#[derive(Debug, Clone)]
pub struct BannedSession {
    pub session: Session,
    pub previous_owner: Option<Uuid>,
}

/// Soft-delete markers.
#[derive(Debug, Clone)]
pub struct SoftDeletion {
    pub reason: String,
    pub deleted_by: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug + 'static {
    async fn insert(&self, data: &CreateSession) -> AppResult<Session>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>>;

    async fn find_by_locator(&self, locator: &str) -> AppResult<Option<Session>>;

    async fn list_all(&self) -> AppResult<Vec<Session>>;

    /// UNUSED sessions, oldest first.
    async fn list_unused(&self, limit: i64) -> AppResult<Vec<Session>>;

    async fn list_owned_by(&self, adbot_id: Uuid) -> AppResult<Vec<Session>>;

    async fn count_by_status(&self) -> AppResult<PoolCounts>;

    /// `UNUSED → ASSIGNED(owner)`.
    async fn claim(&self, session_id: Uuid, adbot_id: Uuid, now: DateTime<Utc>)
    -> AppResult<bool>;

    /// `ASSIGNED(owner) → UNUSED`, for a claim whose handshake failed.
    async fn release_claim(&self, session_id: Uuid, adbot_id: Uuid) -> AppResult<bool>;

    /// `ASSIGNED(owner) → INVALID_FILE`, when the backend has no usable file.
    async fn invalidate_claim(&self, session_id: Uuid, adbot_id: Uuid) -> AppResult<bool>;

    /// Return every session owned by the adbot to the pool. Returns the released rows.
    async fn release_all_owned(&self, adbot_id: Uuid) -> AppResult<Vec<Session>>;

    /// Any non-banned status → `BANNED`, clearing ownership.
    async fn ban(&self, session_id: Uuid, reason: &str) -> AppResult<Option<BannedSession>>;

    /// `BANNED → UNUSED`.
    async fn unban(&self, session_id: Uuid) -> AppResult<bool>;

    /// Overwrite the status of a row still in `expected`. `owner` must be
    /// present exactly when `status` is `Assigned`.
    async fn overwrite_status(
        &self,
        session_id: Uuid,
        expected: SessionStatus,
        status: SessionStatus,
        owner: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;
}

/// Adbot rows.
///
/// The pre-expiry, expiry and grace selections and their guards skip
/// soft-deleted adbots, which are governed by their recovery window alone.
#[async_trait]
pub trait AdbotStore: Send + Sync + std::fmt::Debug + 'static {
    async fn insert(&self, data: &CreateAdbot) -> AppResult<Adbot>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Adbot>>;

    /// QUEUED adbots, oldest queue entry first.
    async fn list_queued(&self) -> AppResult<Vec<Adbot>>;

    async fn apply_allocation(&self, update: &AllocationUpdate) -> AppResult<bool>;

    /// Set `sessions_assigned` to `held` and re-derive the queue columns
    /// under a row lock (see [`Adbot::apply_holdings`]). Returns the row as
    /// written, or `None` if the adbot is gone.
    async fn rederive_holdings(
        &self,
        adbot_id: Uuid,
        held: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Adbot>>;

    /// Active subscriptions expiring in `(now, until]` that were not warned yet.
    async fn list_pre_expiry_due(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Adbot>>;

    async fn mark_pre_expiry_notified(&self, adbot_id: Uuid, now: DateTime<Utc>)
    -> AppResult<bool>;

    /// Active subscriptions with `expires_at < now`.
    async fn list_expiry_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Adbot>>;

    /// `ACTIVE → EXPIRED` together with `expiry_notification_sent`.
    async fn mark_expired(&self, adbot_id: Uuid, now: DateTime<Utc>) -> AppResult<bool>;

    /// Expired subscriptions with `grace_expires_at < now`.
    async fn list_grace_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Adbot>>;

    /// `EXPIRED → DELETED` for both statuses together with `deletion_notification_sent`.
    async fn mark_subscription_deleted(
        &self,
        adbot_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Reset the paid period. Refused for deleted subscriptions and soft-deleted adbots.
    async fn renew(
        &self,
        adbot_id: Uuid,
        expires_at: DateTime<Utc>,
        grace_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    async fn soft_delete(&self, adbot_id: Uuid, deletion: &SoftDeletion) -> AppResult<bool>;

    /// Undo a soft delete whose window is still open. Leaves the adbot
    /// `STOPPED` with `sessions_assigned` counted from the rows it still owns.
    async fn recover(&self, adbot_id: Uuid, now: DateTime<Utc>) -> AppResult<bool>;

    async fn list_soft_deleted_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Adbot>>;

    /// Remove a soft-deleted adbot. With `due_before`, only once its
    /// recovery window closed before that instant.
    async fn hard_delete(&self, adbot_id: Uuid, due_before: Option<DateTime<Utc>>)
    -> AppResult<bool>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync + std::fmt::Debug + 'static {
    async fn insert(&self, data: &NewNotification) -> AppResult<Notification>;

    async fn list_recent(&self, limit: i64) -> AppResult<Vec<Notification>>;

    async fn list_for_adbot(&self, adbot_id: Uuid) -> AppResult<Vec<Notification>>;
}

#[async_trait]
pub trait RunLogStore: Send + Sync + std::fmt::Debug + 'static {
    async fn record(&self, run: &CronRun) -> AppResult<()>;

    /// Latest SUCCESS or PARTIAL run of a job.
    async fn latest_completed(&self, job_name: &str) -> AppResult<Option<CronRun>>;

    async fn list_recent(&self, job_name: &str, limit: i64) -> AppResult<Vec<CronRun>>;
}

/// The four stores bundled for wiring.
#[derive(Debug, Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub adbots: Arc<dyn AdbotStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub runs: Arc<dyn RunLogStore>,
}

impl Stores {
    /// Stores backed by Postgres.
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        use crate::repositories::{
            AdbotRepository, CronRunRepository, NotificationRepository, SessionRepository,
        };
        Self {
            sessions: Arc::new(SessionRepository::new(pool.clone())),
            adbots: Arc::new(AdbotRepository::new(pool.clone())),
            notifications: Arc::new(NotificationRepository::new(pool.clone())),
            runs: Arc::new(CronRunRepository::new(pool)),
        }
    }

    /// Stores backed by one shared in-process state.
    #[cfg(any(test, feature = "memory"))]
    pub fn memory() -> Self {
        let store = Arc::new(crate::memory::MemoryStore::new());
        Self {
            sessions: store.clone(),
            adbots: store.clone(),
            notifications: store.clone(),
            runs: store,
        }
    }
}
