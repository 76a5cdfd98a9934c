//! Route definitions for the AdPool trigger surface.
//!
//! Liveness sits at `/health` and readiness at `/health/detailed`;
//! everything else is mounted under `/api`.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(job_routes())
        .merge(adbot_routes())
        .merge(queue_routes())
        .merge(session_routes());

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::detailed))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodic job triggers (admin or system secret)
fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/pre-expiry", post(handlers::jobs::pre_expiry))
        .route("/jobs/expire", post(handlers::jobs::expire))
        .route("/jobs/expire-check", post(handlers::jobs::expire_check))
        .route("/jobs/reconcile", post(handlers::jobs::reconcile))
        .route("/jobs/permanent-delete", post(handlers::jobs::permanent_delete))
        .route("/jobs/resolve-queue", post(handlers::jobs::resolve_queue))
        .route("/jobs/health", get(handlers::jobs::health))
}

/// Adbot provisioning, allocation, and deletion
fn adbot_routes() -> Router<AppState> {
    Router::new()
        .route("/adbots", post(handlers::adbots::provision))
        .route("/adbots/{id}/allocate", post(handlers::adbots::allocate))
        .route("/adbots/{id}/resolve", post(handlers::adbots::resolve))
        .route("/adbots/{id}/renew", post(handlers::adbots::renew))
        .route("/adbots/{id}/delete", post(handlers::adbots::soft_delete))
        .route("/adbots/{id}/recover", post(handlers::adbots::recover))
        .route("/adbots/{id}/revoke", post(handlers::adbots::revoke))
        .route(
            "/adbots/{id}/permanent-delete",
            post(handlers::adbots::permanent_delete),
        )
}

fn queue_routes() -> Router<AppState> {
    Router::new()
        .route("/queue/stats", get(handlers::queue::stats))
        .route("/queue/list", get(handlers::queue::list))
}

/// Session pool inventory
fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(handlers::sessions::onboard))
        .route("/sessions/bulk", post(handlers::sessions::bulk_onboard))
        .route("/sessions/counts", get(handlers::sessions::counts))
        .route("/sessions/{id}/ban", post(handlers::sessions::ban))
        .route("/sessions/{id}/unban", post(handlers::sessions::unban))
}
