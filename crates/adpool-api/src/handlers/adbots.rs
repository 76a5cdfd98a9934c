//! Adbot handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum_extra::extract::WithRejection;

use adpool_entity::adbot::Adbot;
use adpool_service::{
    AllocationOutcome, ProvisionOutcome, RecoverOutcome, RevocationReport, SoftDeleteOutcome,
};

use crate::dto::ApiResponse;
use crate::dto::request::{
    AllocateRequest, DeleteAdbotRequest, ProvisionRequest, RenewRequest, validated,
};
use crate::error::ApiError;
use crate::extractors::{AdminOnly, AdminOrSystem, IdPath, JsonBody};
use crate::state::AppState;

/// POST /api/adbots
pub async fn provision(
    State(state): State<AppState>,
    _caller: AdminOrSystem,
    WithRejection(Json(req), _): JsonBody<ProvisionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProvisionOutcome>>), ApiError> {
    let req = validated(req)?;
    let outcome = state
        .services
        .provisioning
        .provision(&req.owner_ref, req.required_sessions, req.validity_days)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(outcome))))
}

/// POST /api/adbots/{id}/allocate
pub async fn allocate(
    State(state): State<AppState>,
    _caller: AdminOnly,
    WithRejection(Path(id), _): IdPath,
    WithRejection(Json(req), _): JsonBody<AllocateRequest>,
) -> Result<Json<ApiResponse<AllocationOutcome>>, ApiError> {
    let req = validated(req)?;
    let outcome = state.services.allocator.allocate(id, req.count).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /api/adbots/{id}/resolve
pub async fn resolve(
    State(state): State<AppState>,
    _caller: AdminOnly,
    WithRejection(Path(id), _): IdPath,
) -> Result<Json<ApiResponse<AllocationOutcome>>, ApiError> {
    let outcome = state.services.resolver.resolve_one(id).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /api/adbots/{id}/renew
pub async fn renew(
    State(state): State<AppState>,
    _caller: AdminOrSystem,
    WithRejection(Path(id), _): IdPath,
    WithRejection(Json(req), _): JsonBody<RenewRequest>,
) -> Result<Json<ApiResponse<Adbot>>, ApiError> {
    let req = validated(req)?;
    let adbot = state
        .services
        .lifecycle
        .renew(id, req.validity_days)
        .await?;
    Ok(Json(ApiResponse::ok(adbot)))
}

/// POST /api/adbots/{id}/delete
pub async fn soft_delete(
    State(state): State<AppState>,
    AdminOnly(actor): AdminOnly,
    WithRejection(Path(id), _): IdPath,
    WithRejection(Json(req), _): JsonBody<DeleteAdbotRequest>,
) -> Result<Json<ApiResponse<SoftDeleteOutcome>>, ApiError> {
    let req = validated(req)?;
    let reason = req.reason.unwrap_or_default();
    let outcome = state
        .services
        .deletion
        .soft_delete(id, &reason, &actor)
        .await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /api/adbots/{id}/recover
pub async fn recover(
    State(state): State<AppState>,
    _caller: AdminOnly,
    WithRejection(Path(id), _): IdPath,
) -> Result<Json<ApiResponse<RecoverOutcome>>, ApiError> {
    let outcome = state.services.deletion.recover(id).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /api/adbots/{id}/revoke
pub async fn revoke(
    State(state): State<AppState>,
    _caller: AdminOnly,
    WithRejection(Path(id), _): IdPath,
) -> Result<Json<ApiResponse<RevocationReport>>, ApiError> {
    let report = state.services.revocation.revoke(id).await?;
    Ok(Json(ApiResponse::ok(report)))
}

/// POST /api/adbots/{id}/permanent-delete
pub async fn permanent_delete(
    State(state): State<AppState>,
    _caller: AdminOnly,
    WithRejection(Path(id), _): IdPath,
) -> Result<Json<ApiResponse<RevocationReport>>, ApiError> {
    let report = state.services.deletion.permanently_delete(id).await?;
    Ok(Json(ApiResponse::ok(report)))
}
