//! Administrator soft delete, recovery and the permanent-delete sweep.
//!
//! Kept apart from grace deletion in the lifecycle module: the two share
//! only revocation.

pub mod service;

pub use service::{DeletionService, PurgeSummary, RecoverOutcome, SoftDeleteOutcome};
