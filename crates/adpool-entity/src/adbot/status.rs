//! Adbot and subscription status enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use adpool_core::error::AppError;

/// Stored execution status of an adbot.
///
/// This is the persisted discriminant of [`super::AdbotState`]; the
/// reasons and shortfall live in their own columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "adbot_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AdbotStatus {
    /// Waiting for sessions.
    Queued,
    /// Fully provisioned, not running.
    Stopped,
    /// Running.
    Active,
    /// Suspended by an operator.
    Suspended,
    /// Frozen by an operator.
    Frozen,
    /// Deleted (grace expiry or soft delete).
    Deleted,
}

impl AdbotStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Stopped => "stopped",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Frozen => "frozen",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for AdbotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AdbotStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "stopped" => Ok(Self::Stopped),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "frozen" => Ok(Self::Frozen),
            "deleted" => Ok(Self::Deleted),
            _ => Err(AppError::validation(format!("Invalid adbot status: '{s}'"))),
        }
    }
}

/// Subscription status driven by the lifecycle jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    /// Past `expires_at`, inside the grace window.
    Expired,
    /// Past the grace window. Terminal.
    Deleted,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "deleted" => Ok(Self::Deleted),
            _ => Err(AppError::validation(format!(
                "Invalid subscription status: '{s}'"
            ))),
        }
    }
}
