//! Cron run entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Outcome of one periodic job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cron_run_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    /// Classify a run from per-item results.
    ///
    /// A run with nothing to do is a success.
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => Self::Success,
            (0, _) => Self::Failed,
            _ => Self::Partial,
        }
    }

    /// Whether the run counts towards job health.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Success | Self::Partial)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded run of a periodic job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CronRun {
    pub id: Uuid,
    /// Job name, e.g. `"subscription-expire"`.
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Number of adbots or sessions the run changed.
    pub affected_count: i32,
    /// Joined error messages, if any item failed.
    pub error: Option<String>,
    pub execution_time_ms: i64,
}

/// What a job reports back before it is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub affected_count: i32,
    pub errors: Vec<String>,
    /// Job-specific summary returned to the caller.
    #[serde(default)]
    pub details: serde_json::Value,
}

impl RunOutcome {
    /// Build an outcome from item counts and collected errors.
    pub fn from_items(succeeded: usize, errors: Vec<String>) -> Self {
        Self {
            status: RunStatus::from_counts(succeeded, errors.len()),
            affected_count: i32::try_from(succeeded).unwrap_or(i32::MAX),
            errors,
            details: serde_json::Value::Null,
        }
    }

    /// A run that could not proceed at all.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            affected_count: 0,
            errors: vec![error.into()],
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Errors joined into the single text column of the run log.
    pub fn error_text(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("; "))
        }
    }
}

/// Health verdict for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHealth {
    pub job_name: String,
    pub healthy: bool,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub hours_since_last_run: Option<f64>,
    pub expected_interval_hours: i64,
    pub message: String,
}
