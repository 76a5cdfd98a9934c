//! Liveness and readiness handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use adpool_core::result::AppResult;

use crate::dto::response::{ApiResponse, DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /health
pub async fn health() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// GET /health/detailed
///
/// Answers 503 when any dependency is down.
pub async fn detailed(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<DetailedHealthResponse>>) {
    let database = state.services.inventory.pool_counts().await.map(|_| true);
    let cache = state.cache.health_check().await;
    let backend = state.backend.health_check().await;

    let database = check("database", database);
    let cache = check("cache", cache);
    let backend = check("backend", backend);
    let healthy = database && cache && backend;

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(ApiResponse {
            success: healthy,
            data: DetailedHealthResponse {
                status: label(healthy).to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                database: label(database).to_string(),
                cache: label(cache).to_string(),
                backend: label(backend).to_string(),
            },
        }),
    )
}

fn check(dependency: &str, result: AppResult<bool>) -> bool {
    match result {
        Ok(up) => {
            if !up {
                tracing::warn!(dependency, "Health check reported unavailable");
            }
            up
        }
        Err(e) => {
            tracing::warn!(dependency, error = %e, "Health check failed");
            false
        }
    }
}

fn label(up: bool) -> &'static str {
    if up { "ok" } else { "unavailable" }
}
