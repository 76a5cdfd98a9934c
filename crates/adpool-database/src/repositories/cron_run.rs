//! Cron run log repository.

use async_trait::async_trait;
use sqlx::PgPool;

use adpool_core::error::{AppError, ErrorKind};
use adpool_core::result::AppResult;
use adpool_entity::cron_run::CronRun;

use crate::store::RunLogStore;

/// Postgres-backed operational run log.
#[derive(Debug, Clone)]
pub struct CronRunRepository {
    pool: PgPool,
}

impl CronRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunLogStore for CronRunRepository {
    async fn record(&self, run: &CronRun) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO cron_runs (id, job_name, started_at, finished_at, status, \
             affected_count, error, execution_time_ms) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(run.id)
        .bind(&run.job_name)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.status)
        .bind(run.affected_count)
        .bind(&run.error)
        .bind(run.execution_time_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record cron run", e))?;
        Ok(())
    }

    async fn latest_completed(&self, job_name: &str) -> AppResult<Option<CronRun>> {
        sqlx::query_as::<_, CronRun>(
            "SELECT * FROM cron_runs WHERE job_name = $1 AND status IN ('SUCCESS', 'PARTIAL') \
             ORDER BY finished_at DESC LIMIT 1",
        )
        .bind(job_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read cron runs", e))
    }

    async fn list_recent(&self, job_name: &str, limit: i64) -> AppResult<Vec<CronRun>> {
        sqlx::query_as::<_, CronRun>(
            "SELECT * FROM cron_runs WHERE job_name = $1 ORDER BY finished_at DESC LIMIT $2",
        )
        .bind(job_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list cron runs", e))
    }
}
