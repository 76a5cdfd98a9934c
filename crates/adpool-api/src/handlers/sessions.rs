//! Session pool handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum_extra::extract::WithRejection;

use adpool_entity::session::{PoolCounts, Session};
use adpool_service::{BulkOnboardOutcome, OnboardOutcome};

use crate::dto::ApiResponse;
use crate::dto::request::{
    BanSessionRequest, BulkOnboardRequest, OnboardSessionRequest, validated,
};
use crate::error::ApiError;
use crate::extractors::{AdminOnly, IdPath, JsonBody};
use crate::state::AppState;

/// POST /api/sessions
pub async fn onboard(
    State(state): State<AppState>,
    _caller: AdminOnly,
    WithRejection(Json(req), _): JsonBody<OnboardSessionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OnboardOutcome>>), ApiError> {
    let req = validated(req)?;
    let outcome = state
        .services
        .inventory
        .onboard_session(&req.identity_key, &req.physical_locator)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(outcome))))
}

/// POST /api/sessions/bulk
pub async fn bulk_onboard(
    State(state): State<AppState>,
    _caller: AdminOnly,
    WithRejection(Json(req), _): JsonBody<BulkOnboardRequest>,
) -> Result<Json<ApiResponse<BulkOnboardOutcome>>, ApiError> {
    let batch = validated(req)?.into_batch();
    let outcome = state.services.inventory.onboard_sessions(&batch).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /api/sessions/{id}/ban
pub async fn ban(
    State(state): State<AppState>,
    _caller: AdminOnly,
    WithRejection(Path(id), _): IdPath,
    WithRejection(Json(req), _): JsonBody<BanSessionRequest>,
) -> Result<Json<ApiResponse<Session>>, ApiError> {
    let req = validated(req)?;
    let session = state.services.inventory.ban_session(id, &req.reason).await?;
    Ok(Json(ApiResponse::ok(session)))
}

/// POST /api/sessions/{id}/unban
pub async fn unban(
    State(state): State<AppState>,
    _caller: AdminOnly,
    WithRejection(Path(id), _): IdPath,
) -> Result<Json<ApiResponse<Session>>, ApiError> {
    let session = state.services.inventory.unban_session(id).await?;
    Ok(Json(ApiResponse::ok(session)))
}

/// GET /api/sessions/counts
pub async fn counts(
    State(state): State<AppState>,
    _caller: AdminOnly,
) -> Result<Json<ApiResponse<PoolCounts>>, ApiError> {
    let counts = state.services.inventory.pool_counts().await?;
    Ok(Json(ApiResponse::ok(counts)))
}
