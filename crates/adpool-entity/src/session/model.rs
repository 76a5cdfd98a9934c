//! Session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::SessionStatus;

/// A reusable automation identity held by at most one adbot at a time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    /// Unique session identifier.
    pub id: Uuid,
    /// Identity the session authenticates as (e.g. a phone number).
    pub identity_key: String,
    /// Current allocation status.
    pub status: SessionStatus,
    /// Owning adbot. Set if and only if `status == Assigned`.
    pub owner_adbot_id: Option<Uuid>,
    /// When the current owner claimed it.
    pub assigned_at: Option<DateTime<Utc>>,
    /// Why the session was banned.
    pub banned_reason: Option<String>,
    /// File name of the session on the automation backend.
    pub physical_locator: String,
    /// When the session was onboarded.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Check whether the given adbot owns this session.
    pub fn is_owned_by(&self, adbot_id: Uuid) -> bool {
        self.status == SessionStatus::Assigned && self.owner_adbot_id == Some(adbot_id)
    }

    /// Owner is present exactly when the status is `Assigned`.
    pub fn ownership_consistent(&self) -> bool {
        (self.status == SessionStatus::Assigned) == self.owner_adbot_id.is_some()
    }
}

/// Data required to onboard a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub identity_key: String,
    pub physical_locator: String,
}

/// Per-status session counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounts {
    pub unused: i64,
    pub assigned: i64,
    pub banned: i64,
    pub frozen: i64,
    pub invalid_file: i64,
}

impl PoolCounts {
    /// Add one session of the given status.
    pub fn record(&mut self, status: SessionStatus) {
        match status {
            SessionStatus::Unused => self.unused += 1,
            SessionStatus::Assigned => self.assigned += 1,
            SessionStatus::Banned => self.banned += 1,
            SessionStatus::Frozen => self.frozen += 1,
            SessionStatus::InvalidFile => self.invalid_file += 1,
        }
    }

    pub fn total(&self) -> i64 {
        self.unused + self.assigned + self.banned + self.frozen + self.invalid_file
    }
}
