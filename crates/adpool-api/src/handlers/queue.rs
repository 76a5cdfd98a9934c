//! Queue handlers.

use axum::Json;
use axum::extract::State;

use adpool_entity::adbot::Adbot;
use adpool_service::QueueStats;

use crate::dto::ApiResponse;
use crate::error::ApiError;
use crate::extractors::AdminOnly;
use crate::state::AppState;

/// GET /api/queue/stats
pub async fn stats(
    State(state): State<AppState>,
    _caller: AdminOnly,
) -> Result<Json<ApiResponse<QueueStats>>, ApiError> {
    let stats = state.services.resolver.queue_stats().await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /api/queue/list
///
/// Queued adbots, oldest queue entry first.
pub async fn list(
    State(state): State<AppState>,
    _caller: AdminOnly,
) -> Result<Json<ApiResponse<Vec<Adbot>>>, ApiError> {
    let queued = state.services.resolver.queued().await?;
    Ok(Json(ApiResponse::ok(queued)))
}
