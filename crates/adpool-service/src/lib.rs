//! # adpool-service
//!
//! Business logic for the session pool. Each service orchestrates the
//! stores, the automation backend and the notification sink to implement
//! one part of the allocation and subscription lifecycle.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references. [`Services`] wires the full
//! graph once for the API and the worker.

pub mod allocation;
pub mod context;
pub mod deletion;
pub mod inventory;
pub mod jobs;
pub mod lifecycle;
pub mod monitor;
pub mod notification;
pub mod provision;
pub mod queue;
pub mod reconciliation;
pub mod revocation;
pub mod services;

#[cfg(test)]
mod testing;

pub use allocation::{AllocationOutcome, Allocator};
pub use context::Actor;
pub use deletion::{DeletionService, PurgeSummary, RecoverOutcome, SoftDeleteOutcome};
pub use inventory::{BulkOnboardOutcome, InventoryService, LowStockAlert, OnboardOutcome};
pub use jobs::{JobName, JobReport, PeriodicJobs};
pub use lifecycle::{LifecycleService, TransitionSummary};
pub use monitor::{HealthReport, RunMonitor};
pub use notification::{EmailSender, LogEmailSender, NotificationService};
pub use provision::{ProvisionOutcome, ProvisioningService};
pub use queue::{QueueResolver, QueueStats, ResolveSummary};
pub use reconciliation::ReconciliationEngine;
pub use revocation::{RevocationReport, RevocationService};
pub use services::Services;
