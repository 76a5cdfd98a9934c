//! In-process store for tests and single-node local runs.
//!
//! Each trait method takes the mutex once and performs its check and its
//! write under it, which gives the same exactly-one-winner outcome as the
//! conditional `UPDATE` statements in the Postgres repositories.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use adpool_core::error::AppError;
use adpool_core::result::AppResult;
use adpool_entity::adbot::{Adbot, AdbotStatus, CreateAdbot, SubscriptionStatus};
use adpool_entity::cron_run::CronRun;
use adpool_entity::notification::{NewNotification, Notification};
use adpool_entity::session::{CreateSession, PoolCounts, Session, SessionStatus};

use crate::store::{
    AdbotStore, AllocationUpdate, BannedSession, NotificationStore, RunLogStore, SessionStore,
    SoftDeletion,
};

#[derive(Debug, Default)]
struct InnerState {
    sessions: HashMap<Uuid, Session>,
    adbots: HashMap<Uuid, Adbot>,
    notifications: Vec<Notification>,
    runs: Vec<CronRun>,
}

/// Memory-backed implementation of every store trait.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<InnerState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, data: &CreateSession) -> AppResult<Session> {
        let mut state = self.state.lock().await;
        if state
            .sessions
            .values()
            .any(|s| s.physical_locator == data.physical_locator)
        {
            return Err(AppError::conflict(format!(
                "Session file '{}' is already registered",
                data.physical_locator
            )));
        }
        let now = Utc::now();
        let session = Session {
            id: Uuid::now_v7(),
            identity_key: data.identity_key.clone(),
            status: SessionStatus::Unused,
            owner_adbot_id: None,
            assigned_at: None,
            banned_reason: None,
            physical_locator: data.physical_locator.clone(),
            created_at: now,
            updated_at: now,
        };
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn find_by_locator(&self, locator: &str) -> AppResult<Option<Session>> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .values()
            .find(|s| s.physical_locator == locator)
            .cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Session>> {
        let state = self.state.lock().await;
        let sessions = state.sessions.values().cloned().collect();
        Ok(sorted_by(sessions, |s: &Session| (s.created_at, s.id)))
    }

    async fn list_unused(&self, limit: i64) -> AppResult<Vec<Session>> {
        let state = self.state.lock().await;
        let unused = state
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Unused)
            .cloned()
            .collect();
        let mut unused = sorted_by(unused, |s: &Session| (s.created_at, s.id));
        unused.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(unused)
    }

    async fn list_owned_by(&self, adbot_id: Uuid) -> AppResult<Vec<Session>> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .values()
            .filter(|s| s.is_owned_by(adbot_id))
            .cloned()
            .collect())
    }

    async fn count_by_status(&self) -> AppResult<PoolCounts> {
        let state = self.state.lock().await;
        let mut counts = PoolCounts::default();
        for session in state.sessions.values() {
            counts.record(session.status);
        }
        Ok(counts)
    }

    async fn claim(
        &self,
        session_id: Uuid,
        adbot_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&session_id) {
            Some(s) if s.status == SessionStatus::Unused => {
                s.status = SessionStatus::Assigned;
                s.owner_adbot_id = Some(adbot_id);
                s.assigned_at = Some(now);
                s.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_claim(&self, session_id: Uuid, adbot_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&session_id) {
            Some(s) if s.is_owned_by(adbot_id) => {
                s.status = SessionStatus::Unused;
                s.owner_adbot_id = None;
                s.assigned_at = None;
                s.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn invalidate_claim(&self, session_id: Uuid, adbot_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&session_id) {
            Some(s) if s.is_owned_by(adbot_id) => {
                s.status = SessionStatus::InvalidFile;
                s.owner_adbot_id = None;
                s.assigned_at = None;
                s.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_all_owned(&self, adbot_id: Uuid) -> AppResult<Vec<Session>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut released = Vec::new();
        for s in state.sessions.values_mut() {
            if s.is_owned_by(adbot_id) {
                s.status = SessionStatus::Unused;
                s.owner_adbot_id = None;
                s.assigned_at = None;
                s.updated_at = now;
                released.push(s.clone());
            }
        }
        Ok(released)
    }

    async fn ban(&self, session_id: Uuid, reason: &str) -> AppResult<Option<BannedSession>> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&session_id) {
            Some(s) if s.status != SessionStatus::Banned => {
                let previous_owner = s.owner_adbot_id.take();
                s.status = SessionStatus::Banned;
                s.banned_reason = Some(reason.to_string());
                s.assigned_at = None;
                s.updated_at = Utc::now();
                Ok(Some(BannedSession {
                    session: s.clone(),
                    previous_owner,
                }))
            }
            _ => Ok(None),
        }
    }

    async fn unban(&self, session_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&session_id) {
            Some(s) if s.status == SessionStatus::Banned => {
                s.status = SessionStatus::Unused;
                s.banned_reason = None;
                s.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn overwrite_status(
        &self,
        session_id: Uuid,
        expected: SessionStatus,
        status: SessionStatus,
        owner: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        if (status == SessionStatus::Assigned) != owner.is_some() {
            return Err(AppError::validation(format!(
                "Session status '{status}' requires owner presence to match"
            )));
        }
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&session_id) {
            Some(s) if s.status == expected => {
                s.assigned_at = match owner {
                    None => None,
                    Some(o) if s.owner_adbot_id == Some(o) => s.assigned_at,
                    Some(_) => Some(now),
                };
                if status != SessionStatus::Banned {
                    s.banned_reason = None;
                }
                s.status = status;
                s.owner_adbot_id = owner;
                s.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl AdbotStore for MemoryStore {
    async fn insert(&self, data: &CreateAdbot) -> AppResult<Adbot> {
        let now = Utc::now();
        let adbot = Adbot {
            id: Uuid::now_v7(),
            owner_ref: data.owner_ref.clone(),
            required_sessions: data.required_sessions,
            sessions_assigned: 0,
            status: AdbotStatus::Stopped,
            subscription_status: SubscriptionStatus::Active,
            expires_at: data.expires_at,
            grace_expires_at: data.grace_expires_at,
            missing_sessions_count: 0,
            queued_reason: None,
            queued_at: None,
            status_reason: None,
            pre_expiry_notification_sent: false,
            expiry_notification_sent: false,
            deletion_notification_sent: false,
            deleted_state: false,
            deleted_at: None,
            deletion_scheduled_at: None,
            delete_reason: None,
            deleted_by: None,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .adbots
            .insert(adbot.id, adbot.clone());
        Ok(adbot)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Adbot>> {
        Ok(self.state.lock().await.adbots.get(&id).cloned())
    }

    async fn list_queued(&self) -> AppResult<Vec<Adbot>> {
        let state = self.state.lock().await;
        let queued = state
            .adbots
            .values()
            .filter(|a| a.status == AdbotStatus::Queued)
            .cloned()
            .collect();
        Ok(sorted_by(queued, |a: &Adbot| {
            (a.queued_at.is_none(), a.queued_at, a.created_at, a.id)
        }))
    }

    async fn apply_allocation(&self, update: &AllocationUpdate) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(a) = state.adbots.get_mut(&update.adbot_id) else {
            return Ok(false);
        };
        if a.status != update.expected_status || a.sessions_assigned != update.expected_assigned {
            return Ok(false);
        }
        a.sessions_assigned += update.claimed;
        a.missing_sessions_count = update.missing;
        if update.missing > 0 {
            a.status = AdbotStatus::Queued;
            a.queued_reason = update.queued_reason.clone();
            a.queued_at = a.queued_at.or(Some(update.now));
        } else {
            if a.status == AdbotStatus::Queued {
                a.status = AdbotStatus::Stopped;
            }
            a.queued_reason = None;
            a.queued_at = None;
        }
        a.updated_at = update.now;
        Ok(true)
    }

    async fn rederive_holdings(
        &self,
        adbot_id: Uuid,
        held: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Adbot>> {
        let mut state = self.state.lock().await;
        Ok(state.adbots.get_mut(&adbot_id).map(|a| {
            a.apply_holdings(held, now);
            a.clone()
        }))
    }

    async fn list_pre_expiry_due(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Adbot>> {
        let state = self.state.lock().await;
        let due = state
            .adbots
            .values()
            .filter(|a| {
                a.subscription_status == SubscriptionStatus::Active
                    && !a.deleted_state
                    && !a.pre_expiry_notification_sent
                    && a.expires_at > now
                    && a.expires_at <= until
            })
            .cloned()
            .collect();
        Ok(sorted_by(due, |a: &Adbot| a.expires_at))
    }

    async fn mark_pre_expiry_notified(
        &self,
        adbot_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.adbots.get_mut(&adbot_id) {
            Some(a)
                if a.subscription_status == SubscriptionStatus::Active
                    && !a.deleted_state
                    && !a.pre_expiry_notification_sent =>
            {
                a.pre_expiry_notification_sent = true;
                a.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_expiry_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Adbot>> {
        let state = self.state.lock().await;
        let due = state
            .adbots
            .values()
            .filter(|a| {
                a.subscription_status == SubscriptionStatus::Active
                    && !a.deleted_state
                    && a.expires_at < now
            })
            .cloned()
            .collect();
        Ok(sorted_by(due, |a: &Adbot| a.expires_at))
    }

    async fn mark_expired(&self, adbot_id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.adbots.get_mut(&adbot_id) {
            Some(a)
                if a.subscription_status == SubscriptionStatus::Active
                    && !a.deleted_state
                    && a.expires_at < now
                    && !a.expiry_notification_sent =>
            {
                a.subscription_status = SubscriptionStatus::Expired;
                a.expiry_notification_sent = true;
                a.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_grace_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Adbot>> {
        let state = self.state.lock().await;
        let due = state
            .adbots
            .values()
            .filter(|a| {
                a.subscription_status == SubscriptionStatus::Expired
                    && !a.deleted_state
                    && a.grace_expires_at < now
            })
            .cloned()
            .collect();
        Ok(sorted_by(due, |a: &Adbot| a.grace_expires_at))
    }

    async fn mark_subscription_deleted(
        &self,
        adbot_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.adbots.get_mut(&adbot_id) {
            Some(a)
                if a.subscription_status == SubscriptionStatus::Expired
                    && !a.deleted_state
                    && a.grace_expires_at < now
                    && !a.deletion_notification_sent =>
            {
                a.status = AdbotStatus::Deleted;
                a.subscription_status = SubscriptionStatus::Deleted;
                a.missing_sessions_count = 0;
                a.queued_reason = None;
                a.queued_at = None;
                a.deletion_notification_sent = true;
                a.delete_reason = Some(reason.to_string());
                a.deleted_at = a.deleted_at.or(Some(now));
                a.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn renew(
        &self,
        adbot_id: Uuid,
        expires_at: DateTime<Utc>,
        grace_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.adbots.get_mut(&adbot_id) {
            Some(a)
                if a.subscription_status != SubscriptionStatus::Deleted && !a.deleted_state =>
            {
                a.expires_at = expires_at;
                a.grace_expires_at = grace_expires_at;
                a.subscription_status = SubscriptionStatus::Active;
                a.pre_expiry_notification_sent = false;
                a.expiry_notification_sent = false;
                a.deletion_notification_sent = false;
                a.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn soft_delete(&self, adbot_id: Uuid, deletion: &SoftDeletion) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.adbots.get_mut(&adbot_id) {
            Some(a) if !a.deleted_state && a.status != AdbotStatus::Deleted => {
                a.status = AdbotStatus::Deleted;
                a.deleted_state = true;
                a.missing_sessions_count = 0;
                a.queued_reason = None;
                a.queued_at = None;
                a.deleted_at = Some(deletion.now);
                a.deletion_scheduled_at = Some(deletion.scheduled_at);
                a.delete_reason = Some(deletion.reason.clone());
                a.deleted_by = deletion.deleted_by.clone();
                a.updated_at = deletion.now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn recover(&self, adbot_id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let held = state
            .sessions
            .values()
            .filter(|s| s.owner_adbot_id == Some(adbot_id))
            .count();
        match state.adbots.get_mut(&adbot_id) {
            Some(a) if a.is_recoverable(now) => {
                a.status = AdbotStatus::Stopped;
                a.deleted_state = false;
                a.sessions_assigned = i32::try_from(held).unwrap_or(i32::MAX);
                a.missing_sessions_count = 0;
                a.queued_reason = None;
                a.queued_at = None;
                a.deleted_at = None;
                a.deletion_scheduled_at = None;
                a.delete_reason = None;
                a.deleted_by = None;
                a.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_soft_deleted_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Adbot>> {
        let state = self.state.lock().await;
        let due = state
            .adbots
            .values()
            .filter(|a| a.deleted_state && a.deletion_scheduled_at.is_some_and(|at| at < now))
            .cloned()
            .collect();
        Ok(sorted_by(due, |a: &Adbot| a.deletion_scheduled_at))
    }

    async fn hard_delete(
        &self,
        adbot_id: Uuid,
        due_before: Option<DateTime<Utc>>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let due = state.adbots.get(&adbot_id).is_some_and(|a| {
            a.deleted_state
                && due_before.is_none_or(|now| a.deletion_scheduled_at.is_some_and(|at| at < now))
        });
        if !due {
            return Ok(false);
        }
        if state
            .sessions
            .values()
            .any(|s| s.owner_adbot_id == Some(adbot_id))
        {
            return Err(AppError::database(format!(
                "Adbot {adbot_id} still owns sessions"
            )));
        }
        state.adbots.remove(&adbot_id);
        Ok(true)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert(&self, data: &NewNotification) -> AppResult<Notification> {
        let notification = Notification {
            id: Uuid::now_v7(),
            recipient: data.recipient.clone(),
            kind: data.kind,
            title: data.title.clone(),
            message: data.message.clone(),
            adbot_id: data.adbot_id,
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .await
            .notifications
            .push(notification.clone());
        Ok(notification)
    }

    async fn list_recent(&self, limit: i64) -> AppResult<Vec<Notification>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn list_for_adbot(&self, adbot_id: Uuid) -> AppResult<Vec<Notification>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.adbot_id == Some(adbot_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RunLogStore for MemoryStore {
    async fn record(&self, run: &CronRun) -> AppResult<()> {
        self.state.lock().await.runs.push(run.clone());
        Ok(())
    }

    async fn latest_completed(&self, job_name: &str) -> AppResult<Option<CronRun>> {
        let state = self.state.lock().await;
        Ok(state
            .runs
            .iter()
            .filter(|r| r.job_name == job_name && r.status.is_completed())
            .max_by_key(|r| r.finished_at)
            .cloned())
    }

    async fn list_recent(&self, job_name: &str, limit: i64) -> AppResult<Vec<CronRun>> {
        let state = self.state.lock().await;
        let runs = state
            .runs
            .iter()
            .filter(|r| r.job_name == job_name)
            .cloned()
            .collect();
        let mut runs = sorted_by(runs, |r: &CronRun| std::cmp::Reverse(r.finished_at));
        runs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(runs)
    }
}
