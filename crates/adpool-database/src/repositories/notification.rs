//! Notification repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use adpool_core::error::{AppError, ErrorKind};
use adpool_core::result::AppResult;
use adpool_entity::notification::{NewNotification, Notification};

use crate::store::NotificationStore;

/// Postgres-backed notification sink.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn insert(&self, data: &NewNotification) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (id, recipient, kind, title, message, adbot_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.recipient)
        .bind(data.kind)
        .bind(&data.title)
        .bind(&data.message)
        .bind(data.adbot_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create notification", e))
    }

    async fn list_recent(&self, limit: i64) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list notifications", e))
    }

    async fn list_for_adbot(&self, adbot_id: Uuid) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE adbot_id = $1 ORDER BY created_at ASC",
        )
        .bind(adbot_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list adbot notifications", e)
        })
    }
}
