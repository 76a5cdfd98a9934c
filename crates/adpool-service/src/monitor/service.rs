//! Records periodic job runs and reads them back as health verdicts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use adpool_core::config::monitor::MonitorConfig;
use adpool_core::result::AppResult;
use adpool_database::store::RunLogStore;
use adpool_entity::cron_run::{CronRun, JobHealth, RunOutcome, RunStatus};
use adpool_entity::notification::NotificationKind;

use crate::jobs::JobName;
use crate::notification::NotificationService;

/// Health of every monitored job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub jobs: Vec<JobHealth>,
}

#[derive(Debug, Clone)]
pub struct RunMonitor {
    runs: Arc<dyn RunLogStore>,
    notifier: NotificationService,
    config: MonitorConfig,
    monitored: Vec<JobName>,
}

impl RunMonitor {
    pub fn new(
        runs: Arc<dyn RunLogStore>,
        notifier: NotificationService,
        config: MonitorConfig,
        monitored: Vec<JobName>,
    ) -> Self {
        Self {
            runs,
            notifier,
            config,
            monitored,
        }
    }

    /// Write a run log entry. A failed write is logged and the entry is
    /// still returned to the caller.
    pub async fn record(
        &self,
        job_name: &str,
        started_at: DateTime<Utc>,
        outcome: &RunOutcome,
    ) -> CronRun {
        let finished_at = Utc::now();
        let run = CronRun {
            id: Uuid::now_v7(),
            job_name: job_name.to_string(),
            started_at,
            finished_at,
            status: outcome.status,
            affected_count: outcome.affected_count,
            error: outcome.error_text(),
            execution_time_ms: (finished_at - started_at).num_milliseconds(),
        };

        match run.status {
            RunStatus::Failed => error!(
                job = %job_name,
                error = run.error.as_deref().unwrap_or_default(),
                "Job run failed"
            ),
            status => info!(
                job = %job_name,
                status = %status,
                affected = run.affected_count,
                duration_ms = run.execution_time_ms,
                "Job run finished"
            ),
        }

        if let Err(e) = self.runs.record(&run).await {
            warn!(job = %job_name, error = %e, "Failed to record job run");
        }
        run
    }

    pub async fn job_health(&self, job_name: &str, max_hours: i64) -> AppResult<JobHealth> {
        self.job_health_at(job_name, max_hours, Utc::now()).await
    }

    /// Healthy when the latest SUCCESS or PARTIAL run finished within
    /// `max_hours` of `now`.
    pub async fn job_health_at(
        &self,
        job_name: &str,
        max_hours: i64,
        now: DateTime<Utc>,
    ) -> AppResult<JobHealth> {
        let latest = self.runs.latest_completed(job_name).await?;
        let Some(run) = latest else {
            return Ok(JobHealth {
                job_name: job_name.to_string(),
                healthy: false,
                last_completed_at: None,
                hours_since_last_run: None,
                expected_interval_hours: max_hours,
                message: "No completed run recorded".to_string(),
            });
        };

        let hours = (now - run.finished_at).num_seconds() as f64 / 3600.0;
        let healthy = hours <= max_hours as f64;
        let message = if healthy {
            format!("Last completed {hours:.1} hours ago")
        } else {
            format!("Last completed {hours:.1} hours ago, expected within {max_hours} hours")
        };
        Ok(JobHealth {
            job_name: job_name.to_string(),
            healthy,
            last_completed_at: Some(run.finished_at),
            hours_since_last_run: Some(hours),
            expected_interval_hours: max_hours,
            message,
        })
    }

    pub async fn check_health(&self) -> AppResult<HealthReport> {
        self.check_health_at(Utc::now()).await
    }

    /// Evaluate every monitored job and raise one alert listing the
    /// unhealthy ones.
    pub async fn check_health_at(&self, now: DateTime<Utc>) -> AppResult<HealthReport> {
        let mut jobs = Vec::with_capacity(self.monitored.len());
        for job in &self.monitored {
            let name = job.as_str();
            jobs.push(
                self.job_health_at(name, self.config.expected_hours(name), now)
                    .await?,
            );
        }

        let unhealthy: Vec<String> = jobs
            .iter()
            .filter(|j| !j.healthy)
            .map(|j| format!("{} ({})", j.job_name, j.message))
            .collect();
        if !unhealthy.is_empty() {
            warn!(unhealthy = unhealthy.len(), "Periodic jobs are unhealthy");
            self.notifier
                .alert_admins(
                    NotificationKind::Error,
                    "Cron Jobs Unhealthy",
                    format!("Unhealthy jobs: {}", unhealthy.join(", ")),
                    None,
                )
                .await;
        }

        Ok(HealthReport {
            healthy: unhealthy.is_empty(),
            jobs,
        })
    }
}
