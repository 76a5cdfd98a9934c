//! Reconciliation audit report.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::PoolCounts;
use crate::session::SessionStatus;

/// Kind of correction applied to a registry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixType {
    /// Registry status overwritten to match the external listing.
    StatusMismatch,
    /// File absent from every partition; row marked invalid.
    MissingFile,
}

/// Drift that was surfaced but not healed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// External file without a registry row.
    OrphanedFile,
    /// External owner that is not a known adbot.
    UnknownOwner,
    /// The corrective write failed.
    DatabaseUpdateFailed,
}

/// One applied correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileFix {
    #[serde(rename = "type")]
    pub fix_type: FixType,
    pub session_id: Uuid,
    pub filename: String,
    pub from: SessionStatus,
    pub to: SessionStatus,
    pub action: String,
}

/// One problem left for an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub filename: String,
    pub message: String,
}

/// External partition sizes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExternalCounts {
    pub unused: usize,
    pub assigned: usize,
    pub banned: usize,
    pub frozen: usize,
}

/// Counts on both sides plus the number of mismatches found.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub external: ExternalCounts,
    pub database: PoolCounts,
    pub mismatches: usize,
}

/// Full audit output of one reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub fixed: Vec<ReconcileFix>,
    pub errors: Vec<ReconcileIssue>,
    pub stats: ReconcileStats,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.fixed.is_empty() && self.errors.is_empty()
    }
}
