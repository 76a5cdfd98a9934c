//! Cron scheduler for the periodic jobs.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use adpool_core::config::worker::WorkerConfig;
use adpool_core::error::AppError;
use adpool_service::jobs::{JobName, PeriodicJobs};

/// Cron expression configured for a job. Empty means disabled.
pub fn job_schedule(config: &WorkerConfig, job: JobName) -> &str {
    match job {
        JobName::PreExpiryNotify => &config.pre_expiry_cron,
        JobName::SubscriptionExpire => &config.expiry_cron,
        JobName::SubscriptionExpireCheck => &config.grace_cron,
        JobName::StockReconcile => &config.reconcile_cron,
        JobName::PermanentDeleteExpired => &config.permanent_delete_cron,
        JobName::QueueSweep => &config.queue_sweep_cron,
    }
}

/// Cron-based scheduler for the periodic jobs.
pub struct CronScheduler {
    scheduler: JobScheduler,
    jobs: Arc<PeriodicJobs>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(jobs: Arc<PeriodicJobs>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self { scheduler, jobs })
    }

    /// Register every job with a non-empty schedule plus the health check.
    /// Returns the number of registered schedules.
    pub async fn register_jobs(&self, config: &WorkerConfig) -> Result<usize, AppError> {
        let mut registered = 0;
        for job in JobName::ALL {
            let schedule = job_schedule(config, job);
            if schedule.trim().is_empty() {
                tracing::info!(job = %job, "Schedule disabled");
                continue;
            }
            self.register_job(job, schedule).await?;
            registered += 1;
        }

        if !config.health_check_cron.trim().is_empty() {
            self.register_health_check(&config.health_check_cron)
                .await?;
            registered += 1;
        }

        tracing::info!(registered, "All scheduled jobs registered");
        Ok(registered)
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    async fn register_job(&self, job: JobName, schedule: &str) -> Result<(), AppError> {
        let jobs = Arc::clone(&self.jobs);
        let cron = CronJob::new_async(schedule, move |_uuid, _lock| {
            let jobs = Arc::clone(&jobs);
            Box::pin(async move {
                let report = jobs.run(job).await;
                tracing::debug!(
                    job = %job,
                    status = %report.run.status,
                    affected = report.run.affected_count,
                    "Scheduled run finished"
                );
            })
        })
        .map_err(|e| {
            AppError::configuration(format!("Invalid schedule '{schedule}' for {job}: {e}"))
        })?;

        self.scheduler
            .add(cron)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {job} schedule: {e}")))?;

        tracing::info!(job = %job, schedule, "Registered");
        Ok(())
    }

    async fn register_health_check(&self, schedule: &str) -> Result<(), AppError> {
        let jobs = Arc::clone(&self.jobs);
        let cron = CronJob::new_async(schedule, move |_uuid, _lock| {
            let jobs = Arc::clone(&jobs);
            Box::pin(async move {
                match jobs.check_health().await {
                    Ok(report) if !report.healthy => {
                        tracing::warn!("Periodic jobs unhealthy");
                    }
                    Ok(_) => tracing::debug!("Periodic jobs healthy"),
                    Err(e) => tracing::error!(error = %e, "Health check failed"),
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!("Invalid health check schedule '{schedule}': {e}"))
        })?;

        self.scheduler
            .add(cron)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add health check schedule: {e}")))?;

        tracing::info!(schedule, "Registered: health check");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use adpool_backend::memory::MemoryAutomationBackend;
    use adpool_core::config::AppConfig;
    use adpool_core::error::ErrorKind;
    use adpool_database::store::Stores;
    use adpool_service::{LogEmailSender, Services};

    use super::*;

    fn periodic_jobs(config: &AppConfig) -> Arc<PeriodicJobs> {
        let services = Services::new(
            Stores::memory(),
            Arc::new(MemoryAutomationBackend::new()),
            Arc::new(LogEmailSender),
            config,
        );
        Arc::new(services.jobs)
    }

    #[test]
    fn test_schedule_per_job() {
        let config = WorkerConfig::default();
        assert_eq!(job_schedule(&config, JobName::SubscriptionExpire), "0 */15 * * * *");
        assert_eq!(job_schedule(&config, JobName::StockReconcile), "0 0 */6 * * *");
        assert_eq!(job_schedule(&config, JobName::PermanentDeleteExpired), "0 30 3 * * *");
    }

    #[tokio::test]
    async fn test_registers_every_job_and_health_check() {
        let config = AppConfig::default();
        let scheduler = CronScheduler::new(periodic_jobs(&config)).await.unwrap();

        let registered = scheduler.register_jobs(&config.worker).await.unwrap();

        assert_eq!(registered, JobName::ALL.len() + 1);
    }

    #[tokio::test]
    async fn test_empty_queue_sweep_is_skipped() {
        let mut config = AppConfig::default();
        config.worker.queue_sweep_cron = String::new();
        let scheduler = CronScheduler::new(periodic_jobs(&config)).await.unwrap();

        let registered = scheduler.register_jobs(&config.worker).await.unwrap();

        assert_eq!(registered, JobName::ALL.len());
    }

    #[tokio::test]
    async fn test_invalid_expression_is_configuration_error() {
        let mut config = AppConfig::default();
        config.worker.reconcile_cron = "every six hours".to_string();
        let scheduler = CronScheduler::new(periodic_jobs(&config)).await.unwrap();

        let err = scheduler.register_jobs(&config.worker).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Configuration);
        assert!(err.message.contains("stock-reconcile"));
    }
}
