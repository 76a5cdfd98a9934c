//! Embedded schema migrations for the pool tables.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use adpool_core::error::{AppError, ErrorKind};
use adpool_core::result::AppResult;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Bring the schema up to the newest embedded migration.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    let latest = MIGRATOR.iter().map(|m| m.version).max().unwrap_or_default();
    info!(embedded = MIGRATOR.iter().count(), latest, "Applying schema migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(ErrorKind::Database, format!("Schema migration failed: {e}"), e)
    })?;

    info!(latest, "Schema is current");
    Ok(())
}
