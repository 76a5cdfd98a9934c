//! Credential checks and the failed-attempt limiter.

use axum::http::StatusCode;

use crate::helpers::{SYSTEM_SECRET, TestApp};

#[tokio::test]
async fn test_health_needs_no_credentials() {
    let app = TestApp::new().await;

    let response = app.request("GET", "/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["status"], "ok");
}

#[tokio::test]
async fn test_readiness_reports_each_dependency() {
    let app = TestApp::new().await;

    let ready = app.request("GET", "/health/detailed", None, None).await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.data()["database"], "ok");
    assert_eq!(ready.data()["cache"], "ok");
    assert_eq!(ready.data()["backend"], "ok");

    app.backend.set_unavailable(true).await;
    let degraded = app.request("GET", "/health/detailed", None, None).await;
    assert_eq!(degraded.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(degraded.body["success"], false);
    assert_eq!(degraded.data()["status"], "unavailable");
    assert_eq!(degraded.data()["backend"], "unavailable");
    assert_eq!(degraded.data()["database"], "ok");
}

#[tokio::test]
async fn test_job_trigger_without_credentials_is_rejected() {
    let app = TestApp::new().await;

    let response = app.request("POST", "/api/jobs/expire", None, None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "AUTHENTICATION");
    assert!(response.body["details"].is_null());
}

#[tokio::test]
async fn test_system_secret_and_admin_token_both_trigger_jobs() {
    let app = TestApp::new().await;

    let as_system = app.request_as_system("POST", "/api/jobs/expire", None).await;
    assert_eq!(as_system.status, StatusCode::OK);
    assert_eq!(as_system.body["success"], true);
    assert_eq!(as_system.data()["job_name"], "subscription-expire");

    let token = app.admin_token();
    let as_admin = app
        .request("POST", "/api/jobs/expire", None, Some(&token))
        .await;
    assert_eq!(as_admin.status, StatusCode::OK);
}

#[tokio::test]
async fn test_system_secret_cannot_use_admin_routes() {
    let app = TestApp::new().await;

    let response = app.request_as_system("GET", "/api/queue/stats", None).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "AUTHORIZATION");
}

#[tokio::test]
async fn test_non_admin_token_is_forbidden() {
    let app = TestApp::new().await;
    let token = app.user_token();

    let response = app
        .request("GET", "/api/sessions/counts", None, Some(&token))
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_repeated_failures_are_rate_limited_per_address() {
    let app = TestApp::new().await;
    let bad = [("X-System-Secret", "wrong"), ("X-Forwarded-For", "198.51.100.4")];

    for _ in 0..3 {
        let response = app
            .request_with_headers("POST", "/api/jobs/reconcile", None, &bad)
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    let limited = app
        .request_with_headers("POST", "/api/jobs/reconcile", None, &bad)
        .await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["error"], "RATE_LIMIT");
    let retry_after: u64 = limited.retry_after.as_deref().unwrap().parse().unwrap();
    // The lockout outlasts the counting window.
    assert!(retry_after > app.config.rate_limit.auth_window_seconds);
    assert!(retry_after <= app.config.rate_limit.auth_lockout_seconds);

    // The block covers valid credentials from the same address too.
    let good_same_address = app
        .request_with_headers(
            "POST",
            "/api/jobs/reconcile",
            None,
            &[("X-System-Secret", SYSTEM_SECRET), ("X-Forwarded-For", "198.51.100.4")],
        )
        .await;
    assert_eq!(good_same_address.status, StatusCode::TOO_MANY_REQUESTS);

    let other_address = app
        .request_with_headers(
            "POST",
            "/api/jobs/reconcile",
            None,
            &[("X-System-Secret", SYSTEM_SECRET), ("X-Forwarded-For", "198.51.100.5")],
        )
        .await;
    assert_eq!(other_address.status, StatusCode::OK);
}

#[tokio::test]
async fn test_success_resets_failure_count() {
    let app = TestApp::new().await;
    let address = ("X-Forwarded-For", "203.0.113.9");
    let bad = [("X-System-Secret", "wrong"), address];
    let good = [("X-System-Secret", SYSTEM_SECRET), address];

    for _ in 0..2 {
        app.request_with_headers("POST", "/api/jobs/expire", None, &bad)
            .await;
    }
    let ok = app
        .request_with_headers("POST", "/api/jobs/expire", None, &good)
        .await;
    assert_eq!(ok.status, StatusCode::OK);

    for _ in 0..2 {
        let response = app
            .request_with_headers("POST", "/api/jobs/expire", None, &bad)
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }
}
