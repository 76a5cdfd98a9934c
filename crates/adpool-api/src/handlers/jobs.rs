//! Periodic job triggers.
//!
//! Each trigger runs the job through the same facade as the scheduler and
//! returns the recorded run. A FAILED run answers 500 so external
//! schedulers can alert on the status code alone.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use adpool_entity::cron_run::RunStatus;
use adpool_service::{HealthReport, JobName, JobReport};

use crate::dto::ApiResponse;
use crate::error::ApiError;
use crate::extractors::AdminOrSystem;
use crate::state::AppState;

type JobResponse = (StatusCode, Json<ApiResponse<JobReport>>);

async fn trigger(state: &AppState, caller: &AdminOrSystem, job: JobName) -> JobResponse {
    tracing::info!(job = %job, actor = %caller.0.reference(), "Job triggered");
    let report = state.services.jobs.run(job).await;

    let failed = report.run.status == RunStatus::Failed;
    let status = if failed {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(ApiResponse {
            success: !failed,
            data: report,
        }),
    )
}

/// POST /api/jobs/pre-expiry
pub async fn pre_expiry(State(state): State<AppState>, caller: AdminOrSystem) -> JobResponse {
    trigger(&state, &caller, JobName::PreExpiryNotify).await
}

/// POST /api/jobs/expire
pub async fn expire(State(state): State<AppState>, caller: AdminOrSystem) -> JobResponse {
    trigger(&state, &caller, JobName::SubscriptionExpire).await
}

/// POST /api/jobs/expire-check
pub async fn expire_check(State(state): State<AppState>, caller: AdminOrSystem) -> JobResponse {
    trigger(&state, &caller, JobName::SubscriptionExpireCheck).await
}

/// POST /api/jobs/reconcile
pub async fn reconcile(State(state): State<AppState>, caller: AdminOrSystem) -> JobResponse {
    trigger(&state, &caller, JobName::StockReconcile).await
}

/// POST /api/jobs/permanent-delete
pub async fn permanent_delete(State(state): State<AppState>, caller: AdminOrSystem) -> JobResponse {
    trigger(&state, &caller, JobName::PermanentDeleteExpired).await
}

/// POST /api/jobs/resolve-queue
pub async fn resolve_queue(State(state): State<AppState>, caller: AdminOrSystem) -> JobResponse {
    trigger(&state, &caller, JobName::QueueSweep).await
}

/// GET /api/jobs/health
pub async fn health(
    State(state): State<AppState>,
    _caller: AdminOrSystem,
) -> Result<Json<ApiResponse<HealthReport>>, ApiError> {
    let report = state.services.jobs.check_health().await?;
    Ok(Json(ApiResponse::ok(report)))
}
