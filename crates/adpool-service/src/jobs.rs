//! Periodic job facade.
//!
//! The HTTP trigger surface and the in-process scheduler both run jobs
//! through [`PeriodicJobs`], so every run is recorded the same way.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use adpool_core::error::AppError;
use adpool_core::result::AppResult;
use adpool_entity::cron_run::{CronRun, RunOutcome};

use crate::deletion::DeletionService;
use crate::lifecycle::LifecycleService;
use crate::monitor::{HealthReport, RunMonitor};
use crate::queue::QueueResolver;
use crate::reconciliation::{ReconciliationEngine, run_outcome};

/// Every periodic job, by its run log name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobName {
    PreExpiryNotify,
    SubscriptionExpire,
    SubscriptionExpireCheck,
    StockReconcile,
    PermanentDeleteExpired,
    QueueSweep,
}

impl JobName {
    pub const ALL: [JobName; 6] = [
        Self::PreExpiryNotify,
        Self::SubscriptionExpire,
        Self::SubscriptionExpireCheck,
        Self::StockReconcile,
        Self::PermanentDeleteExpired,
        Self::QueueSweep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreExpiryNotify => "pre-expiry-notify",
            Self::SubscriptionExpire => "subscription-expire",
            Self::SubscriptionExpireCheck => "subscription-expire-check",
            Self::StockReconcile => "stock-reconcile",
            Self::PermanentDeleteExpired => "permanent-delete-expired",
            Self::QueueSweep => "queue-sweep",
        }
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|job| job.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Unknown job: '{s}'")))
    }
}

/// A recorded run plus the job-specific summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    #[serde(flatten)]
    pub run: CronRun,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct PeriodicJobs {
    lifecycle: LifecycleService,
    reconciliation: ReconciliationEngine,
    deletion: DeletionService,
    resolver: QueueResolver,
    monitor: RunMonitor,
}

impl PeriodicJobs {
    pub fn new(
        lifecycle: LifecycleService,
        reconciliation: ReconciliationEngine,
        deletion: DeletionService,
        resolver: QueueResolver,
        monitor: RunMonitor,
    ) -> Self {
        Self {
            lifecycle,
            reconciliation,
            deletion,
            resolver,
            monitor,
        }
    }

    pub async fn run(&self, job: JobName) -> JobReport {
        self.run_at(job, Utc::now()).await
    }

    /// Run one job and record its outcome. An error that stops the job
    /// is recorded as a FAILED run, never returned.
    pub async fn run_at(&self, job: JobName, now: DateTime<Utc>) -> JobReport {
        let started = Utc::now();
        info!(job = %job, "Job started");
        let outcome = match self.execute(job, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job = %job, error = %e, "Job aborted");
                RunOutcome::failed(e.message)
            }
        };
        let run = self.monitor.record(job.as_str(), started, &outcome).await;
        JobReport {
            run,
            details: outcome.details,
        }
    }

    async fn execute(&self, job: JobName, now: DateTime<Utc>) -> AppResult<RunOutcome> {
        Ok(match job {
            JobName::PreExpiryNotify => self
                .lifecycle
                .evaluate_pre_expiry_at(now)
                .await?
                .into_outcome(),
            JobName::SubscriptionExpire => {
                self.lifecycle.evaluate_expiry_at(now).await?.into_outcome()
            }
            JobName::SubscriptionExpireCheck => self
                .lifecycle
                .evaluate_grace_revocation_at(now)
                .await?
                .into_outcome(),
            JobName::StockReconcile => {
                let report = self.reconciliation.reconcile_at(now).await?;
                run_outcome(&report)
            }
            JobName::PermanentDeleteExpired => self
                .deletion
                .permanently_delete_expired_at(now)
                .await?
                .into_outcome(),
            JobName::QueueSweep => {
                let summary = self.resolver.resolve_queued().await?;
                let details = serde_json::to_value(&summary).unwrap_or_default();
                RunOutcome::from_items(summary.progressed(), summary.errors).with_details(details)
            }
        })
    }

    pub async fn check_health(&self) -> AppResult<HealthReport> {
        self.monitor.check_health().await
    }
}
