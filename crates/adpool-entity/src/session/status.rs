//! Session allocation status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use adpool_core::error::AppError;

/// Allocation status of a session in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// In the pool, claimable.
    Unused,
    /// Held by exactly one adbot.
    Assigned,
    /// Banned by an operator or the backend.
    Banned,
    /// Frozen by the backend.
    Frozen,
    /// The backend has no usable file for this row.
    InvalidFile,
}

impl SessionStatus {
    /// Whether the allocator may claim a session in this status.
    pub fn is_allocatable(&self) -> bool {
        matches!(self, Self::Unused)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unused => "unused",
            Self::Assigned => "assigned",
            Self::Banned => "banned",
            Self::Frozen => "frozen",
            Self::InvalidFile => "invalid_file",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unused" => Ok(Self::Unused),
            "assigned" => Ok(Self::Assigned),
            "banned" => Ok(Self::Banned),
            "frozen" => Ok(Self::Frozen),
            "invalid_file" => Ok(Self::InvalidFile),
            _ => Err(AppError::validation(format!("Invalid session status: '{s}'"))),
        }
    }
}
