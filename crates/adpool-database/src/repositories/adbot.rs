//! Adbot repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use adpool_core::error::{AppError, ErrorKind};
use adpool_core::result::AppResult;
use adpool_entity::adbot::{Adbot, CreateAdbot};

use crate::store::{AdbotStore, AllocationUpdate, SoftDeletion};

/// Postgres-backed adbot store.
#[derive(Debug, Clone)]
pub struct AdbotRepository {
    pool: PgPool,
}

impl AdbotRepository {
    /// Create a new adbot repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_list(&self, sql: &str, now: DateTime<Utc>, what: &str) -> AppResult<Vec<Adbot>> {
        sqlx::query_as::<_, Adbot>(sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, format!("Failed to list {what}"), e))
    }
}

#[async_trait]
impl AdbotStore for AdbotRepository {
    async fn insert(&self, data: &CreateAdbot) -> AppResult<Adbot> {
        sqlx::query_as::<_, Adbot>(
            "INSERT INTO adbots (id, owner_ref, required_sessions, expires_at, grace_expires_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.owner_ref)
        .bind(data.required_sessions)
        .bind(data.expires_at)
        .bind(data.grace_expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create adbot", e))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Adbot>> {
        sqlx::query_as::<_, Adbot>("SELECT * FROM adbots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find adbot", e))
    }

    async fn list_queued(&self) -> AppResult<Vec<Adbot>> {
        sqlx::query_as::<_, Adbot>(
            "SELECT * FROM adbots WHERE status = 'queued' \
             ORDER BY queued_at ASC NULLS LAST, created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list queued adbots", e))
    }

    async fn apply_allocation(&self, update: &AllocationUpdate) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE adbots SET \
                sessions_assigned = sessions_assigned + $4, \
                missing_sessions_count = $5, \
                status = CASE WHEN $5 > 0 THEN 'queued'::adbot_status \
                              WHEN status = 'queued' THEN 'stopped'::adbot_status \
                              ELSE status END, \
                queued_reason = CASE WHEN $5 > 0 THEN $6 ELSE NULL END, \
                queued_at = CASE WHEN $5 > 0 THEN COALESCE(queued_at, $7) ELSE NULL END, \
                updated_at = $7 \
             WHERE id = $1 AND status = $2 AND sessions_assigned = $3",
        )
        .bind(update.adbot_id)
        .bind(update.expected_status)
        .bind(update.expected_assigned)
        .bind(update.claimed)
        .bind(update.missing)
        .bind(&update.queued_reason)
        .bind(update.now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to apply allocation", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn rederive_holdings(
        &self,
        adbot_id: Uuid,
        held: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Adbot>> {
        let db_err = |e: sqlx::Error| {
            AppError::with_source(ErrorKind::Database, "Failed to recount adbot holdings", e)
        };
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let Some(mut adbot) =
            sqlx::query_as::<_, Adbot>("SELECT * FROM adbots WHERE id = $1 FOR UPDATE")
                .bind(adbot_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?
        else {
            return Ok(None);
        };
        adbot.apply_holdings(held, now);

        sqlx::query(
            "UPDATE adbots SET sessions_assigned = $2, status = $3, missing_sessions_count = $4, \
             queued_reason = $5, queued_at = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(adbot.id)
        .bind(adbot.sessions_assigned)
        .bind(adbot.status)
        .bind(adbot.missing_sessions_count)
        .bind(&adbot.queued_reason)
        .bind(adbot.queued_at)
        .bind(adbot.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(Some(adbot))
    }

    async fn list_pre_expiry_due(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Adbot>> {
        sqlx::query_as::<_, Adbot>(
            "SELECT * FROM adbots WHERE subscription_status = 'active' AND deleted_state = FALSE \
             AND pre_expiry_notification_sent = FALSE \
             AND expires_at > $1 AND expires_at <= $2 ORDER BY expires_at ASC",
        )
        .bind(now)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list pre-expiry adbots", e)
        })
    }

    async fn mark_pre_expiry_notified(
        &self,
        adbot_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE adbots SET pre_expiry_notification_sent = TRUE, updated_at = $2 \
             WHERE id = $1 AND subscription_status = 'active' AND deleted_state = FALSE \
             AND pre_expiry_notification_sent = FALSE",
        )
        .bind(adbot_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to flag pre-expiry warning", e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_expiry_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Adbot>> {
        self.fetch_list(
            "SELECT * FROM adbots WHERE subscription_status = 'active' AND deleted_state = FALSE \
             AND expires_at < $1 ORDER BY expires_at ASC",
            now,
            "expiring adbots",
        )
        .await
    }

    async fn mark_expired(&self, adbot_id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE adbots SET subscription_status = 'expired', expiry_notification_sent = TRUE, \
             updated_at = $2 \
             WHERE id = $1 AND subscription_status = 'active' AND expires_at < $2 \
             AND expiry_notification_sent = FALSE AND deleted_state = FALSE",
        )
        .bind(adbot_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to expire adbot", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_grace_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Adbot>> {
        self.fetch_list(
            "SELECT * FROM adbots WHERE subscription_status = 'expired' AND deleted_state = FALSE \
             AND grace_expires_at < $1 ORDER BY grace_expires_at ASC",
            now,
            "adbots past grace",
        )
        .await
    }

    async fn mark_subscription_deleted(
        &self,
        adbot_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE adbots SET status = 'deleted', subscription_status = 'deleted', \
             missing_sessions_count = 0, queued_reason = NULL, queued_at = NULL, \
             deletion_notification_sent = TRUE, delete_reason = $2, \
             deleted_at = COALESCE(deleted_at, $3), updated_at = $3 \
             WHERE id = $1 AND subscription_status = 'expired' AND grace_expires_at < $3 \
             AND deletion_notification_sent = FALSE AND deleted_state = FALSE",
        )
        .bind(adbot_id)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete adbot", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn renew(
        &self,
        adbot_id: Uuid,
        expires_at: DateTime<Utc>,
        grace_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE adbots SET expires_at = $2, grace_expires_at = $3, \
             subscription_status = 'active', pre_expiry_notification_sent = FALSE, \
             expiry_notification_sent = FALSE, deletion_notification_sent = FALSE, \
             updated_at = $4 \
             WHERE id = $1 AND subscription_status <> 'deleted' AND deleted_state = FALSE",
        )
        .bind(adbot_id)
        .bind(expires_at)
        .bind(grace_expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to renew adbot", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn soft_delete(&self, adbot_id: Uuid, deletion: &SoftDeletion) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE adbots SET status = 'deleted', deleted_state = TRUE, \
             missing_sessions_count = 0, queued_reason = NULL, queued_at = NULL, \
             deleted_at = $4, deletion_scheduled_at = $3, delete_reason = $2, \
             deleted_by = $5, updated_at = $4 \
             WHERE id = $1 AND deleted_state = FALSE AND status <> 'deleted'",
        )
        .bind(adbot_id)
        .bind(&deletion.reason)
        .bind(deletion.scheduled_at)
        .bind(deletion.now)
        .bind(&deletion.deleted_by)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to soft-delete adbot", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn recover(&self, adbot_id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE adbots SET status = 'stopped', deleted_state = FALSE, \
             sessions_assigned = (SELECT COUNT(*)::INT FROM sessions WHERE owner_adbot_id = $1), \
             missing_sessions_count = 0, queued_reason = NULL, queued_at = NULL, \
             deleted_at = NULL, deletion_scheduled_at = NULL, delete_reason = NULL, \
             deleted_by = NULL, updated_at = $2 \
             WHERE id = $1 AND deleted_state = TRUE AND deletion_scheduled_at > $2 \
             AND subscription_status <> 'deleted'",
        )
        .bind(adbot_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to recover adbot", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_soft_deleted_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Adbot>> {
        self.fetch_list(
            "SELECT * FROM adbots WHERE deleted_state = TRUE AND deletion_scheduled_at < $1 \
             ORDER BY deletion_scheduled_at ASC",
            now,
            "soft-deleted adbots",
        )
        .await
    }

    async fn hard_delete(
        &self,
        adbot_id: Uuid,
        due_before: Option<DateTime<Utc>>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM adbots WHERE id = $1 AND deleted_state = TRUE \
             AND ($2::timestamptz IS NULL OR deletion_scheduled_at < $2)",
        )
        .bind(adbot_id)
        .bind(due_before)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to permanently delete adbot", e)
        })?;
        Ok(result.rows_affected() == 1)
    }
}
