//! Reconciliation audit report types.

pub mod report;

pub use report::{
    ExternalCounts, FixType, IssueType, ReconcileFix, ReconcileIssue, ReconcileStats,
    ReconciliationReport,
};
