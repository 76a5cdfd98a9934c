//! Session registry repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use adpool_core::error::{AppError, ErrorKind};
use adpool_core::result::AppResult;
use adpool_entity::session::{CreateSession, PoolCounts, Session, SessionStatus};

use crate::store::{BannedSession, SessionStore};

/// Postgres-backed session registry.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BannedRow {
    #[sqlx(flatten)]
    session: Session,
    previous_owner: Option<Uuid>,
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn insert(&self, data: &CreateSession) -> AppResult<Session> {
        sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (id, identity_key, status, physical_locator) \
             VALUES ($1, $2, 'unused', $3) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.identity_key)
        .bind(&data.physical_locator)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::conflict(format!(
                "Session file '{}' is already registered",
                data.physical_locator
            )),
            _ => AppError::with_source(ErrorKind::Database, "Failed to insert session", e),
        })
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find session", e))
    }

    async fn find_by_locator(&self, locator: &str) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE physical_locator = $1")
            .bind(locator)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find session by locator", e)
            })
    }

    async fn list_all(&self) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list sessions", e))
    }

    async fn list_unused(&self, limit: i64) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE status = 'unused' ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list unused sessions", e)
        })
    }

    async fn list_owned_by(&self, adbot_id: Uuid) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE owner_adbot_id = $1 AND status = 'assigned' \
             ORDER BY assigned_at ASC",
        )
        .bind(adbot_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list owned sessions", e)
        })
    }

    async fn count_by_status(&self) -> AppResult<PoolCounts> {
        let rows: Vec<(SessionStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM sessions GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to count sessions", e)
                })?;

        let mut counts = PoolCounts::default();
        for (status, count) in rows {
            match status {
                SessionStatus::Unused => counts.unused = count,
                SessionStatus::Assigned => counts.assigned = count,
                SessionStatus::Banned => counts.banned = count,
                SessionStatus::Frozen => counts.frozen = count,
                SessionStatus::InvalidFile => counts.invalid_file = count,
            }
        }
        Ok(counts)
    }

    async fn claim(
        &self,
        session_id: Uuid,
        adbot_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'assigned', owner_adbot_id = $2, assigned_at = $3, \
             updated_at = $3 WHERE id = $1 AND status = 'unused'",
        )
        .bind(session_id)
        .bind(adbot_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim session", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_claim(&self, session_id: Uuid, adbot_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'unused', owner_adbot_id = NULL, assigned_at = NULL, \
             updated_at = NOW() WHERE id = $1 AND status = 'assigned' AND owner_adbot_id = $2",
        )
        .bind(session_id)
        .bind(adbot_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to release claim", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn invalidate_claim(&self, session_id: Uuid, adbot_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'invalid_file', owner_adbot_id = NULL, \
             assigned_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = 'assigned' AND owner_adbot_id = $2",
        )
        .bind(session_id)
        .bind(adbot_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to mark session invalid", e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_all_owned(&self, adbot_id: Uuid) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "UPDATE sessions SET status = 'unused', owner_adbot_id = NULL, assigned_at = NULL, \
             updated_at = NOW() WHERE owner_adbot_id = $1 AND status = 'assigned' RETURNING *",
        )
        .bind(adbot_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to release sessions", e))
    }

    async fn ban(&self, session_id: Uuid, reason: &str) -> AppResult<Option<BannedSession>> {
        let row = sqlx::query_as::<_, BannedRow>(
            "UPDATE sessions s SET status = 'banned', banned_reason = $2, owner_adbot_id = NULL, \
             assigned_at = NULL, updated_at = NOW() \
             FROM (SELECT id, owner_adbot_id FROM sessions \
                   WHERE id = $1 AND status <> 'banned' FOR UPDATE) prev \
             WHERE s.id = prev.id \
             RETURNING s.*, prev.owner_adbot_id AS previous_owner",
        )
        .bind(session_id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to ban session", e))?;

        Ok(row.map(|r| BannedSession {
            session: r.session,
            previous_owner: r.previous_owner,
        }))
    }

    async fn unban(&self, session_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'unused', banned_reason = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = 'banned'",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to unban session", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn overwrite_status(
        &self,
        session_id: Uuid,
        expected: SessionStatus,
        status: SessionStatus,
        owner: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        if (status == SessionStatus::Assigned) != owner.is_some() {
            return Err(AppError::validation(format!(
                "Session status '{status}' requires owner presence to match"
            )));
        }
        let result = sqlx::query(
            "UPDATE sessions SET status = $3, owner_adbot_id = $4, \
             assigned_at = CASE WHEN $4::uuid IS NULL THEN NULL \
                                WHEN owner_adbot_id = $4 THEN assigned_at ELSE $5 END, \
             banned_reason = CASE WHEN $3 = 'banned'::session_status THEN banned_reason ELSE NULL END, \
             updated_at = $5 WHERE id = $1 AND status = $2",
        )
        .bind(session_id)
        .bind(expected)
        .bind(status)
        .bind(owner)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to overwrite session status", e)
        })?;
        Ok(result.rows_affected() == 1)
    }
}
