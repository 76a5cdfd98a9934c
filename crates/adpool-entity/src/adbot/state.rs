//! Tagged adbot state.
//!
//! The stored columns (`status`, `missing_sessions_count`, `queued_reason`,
//! `status_reason`, `delete_reason`) are folded into one [`AdbotState`]
//! value. Independent booleans are only ever produced from it through
//! [`AdbotState::flags`].

use serde::{Deserialize, Serialize};

use adpool_core::error::AppError;
use adpool_core::result::AppResult;

use super::status::AdbotStatus;

/// The single source of truth for what an adbot is doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AdbotState {
    Stopped,
    Active,
    Suspended { reason: String },
    Frozen { reason: String },
    Queued { missing: i32, reason: String },
    Deleted { reason: String },
}

/// Boolean projection kept for callers that still expect flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFlags {
    pub frozen: bool,
    pub suspended: bool,
    pub deleted: bool,
    pub queued: bool,
}

impl AdbotState {
    /// Fold stored columns into a state, rejecting invalid combinations.
    pub fn from_columns(
        status: AdbotStatus,
        missing_sessions_count: i32,
        queued_reason: Option<&str>,
        status_reason: Option<&str>,
        delete_reason: Option<&str>,
    ) -> AppResult<Self> {
        let queued = status == AdbotStatus::Queued;
        if queued != (missing_sessions_count > 0) {
            return Err(AppError::inconsistency(format!(
                "Adbot status '{status}' does not match missing_sessions_count {missing_sessions_count}"
            )));
        }
        let reason = |r: Option<&str>| r.unwrap_or_default().to_string();
        Ok(match status {
            AdbotStatus::Stopped => Self::Stopped,
            AdbotStatus::Active => Self::Active,
            AdbotStatus::Suspended => Self::Suspended {
                reason: reason(status_reason),
            },
            AdbotStatus::Frozen => Self::Frozen {
                reason: reason(status_reason),
            },
            AdbotStatus::Queued => Self::Queued {
                missing: missing_sessions_count,
                reason: reason(queued_reason),
            },
            AdbotStatus::Deleted => Self::Deleted {
                reason: reason(delete_reason),
            },
        })
    }

    /// The stored discriminant.
    pub fn status(&self) -> AdbotStatus {
        match self {
            Self::Stopped => AdbotStatus::Stopped,
            Self::Active => AdbotStatus::Active,
            Self::Suspended { .. } => AdbotStatus::Suspended,
            Self::Frozen { .. } => AdbotStatus::Frozen,
            Self::Queued { .. } => AdbotStatus::Queued,
            Self::Deleted { .. } => AdbotStatus::Deleted,
        }
    }

    /// Shortfall to persist in `missing_sessions_count`.
    pub fn missing(&self) -> i32 {
        match self {
            Self::Queued { missing, .. } => *missing,
            _ => 0,
        }
    }

    pub fn flags(&self) -> StatusFlags {
        StatusFlags {
            frozen: matches!(self, Self::Frozen { .. }),
            suspended: matches!(self, Self::Suspended { .. }),
            deleted: matches!(self, Self::Deleted { .. }),
            queued: matches!(self, Self::Queued { .. }),
        }
    }
}
