//! Periodic job triggers.

use axum::http::StatusCode;
use chrono::Duration;

use adpool_entity::adbot::{AdbotStatus, SubscriptionStatus};
use adpool_entity::cron_run::RunStatus;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_expire_trigger_transitions_and_records_run() {
    let app = TestApp::new().await;
    app.seed_sessions(1).await;
    let adbot = app.seed_adbot(1, Duration::hours(-1)).await;

    let response = app.request_as_system("POST", "/api/jobs/expire", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["status"], "SUCCESS");
    assert_eq!(response.data()["affected_count"], 1);
    assert_eq!(
        app.adbot(adbot.id).await.subscription_status,
        SubscriptionStatus::Expired
    );

    let runs = app
        .stores
        .runs
        .list_recent("subscription-expire", 10)
        .await
        .unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Success);
}

#[tokio::test]
async fn test_reconcile_with_backend_down_reports_failed_run() {
    let app = TestApp::new().await;
    app.seed_sessions(2).await;
    app.backend.set_unavailable(true).await;

    let response = app.request_as_system("POST", "/api/jobs/reconcile", None).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.data()["status"], "FAILED");
    assert!(response.data()["error"].as_str().is_some());
}

#[tokio::test]
async fn test_resolve_queue_trigger_serves_waiting_adbot() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let provisioned = app
        .request(
            "POST",
            "/api/adbots",
            Some(serde_json::json!({"owner_ref": "tenant-7", "required_sessions": 2})),
            Some(&token),
        )
        .await;
    let id = provisioned.data()["adbot"]["id"].as_str().unwrap().to_string();
    assert_eq!(provisioned.data()["adbot"]["status"], "queued");

    app.seed_sessions(2).await;
    let response = app
        .request_as_system("POST", "/api/jobs/resolve-queue", None)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["details"]["resolved"], 1);
    let adbot = app.adbot(id.parse().unwrap()).await;
    assert_eq!(adbot.status, AdbotStatus::Stopped);
    assert_eq!(adbot.sessions_assigned, 2);
}

#[tokio::test]
async fn test_health_reports_jobs_that_never_ran() {
    let app = TestApp::new().await;
    app.request_as_system("POST", "/api/jobs/expire", None).await;

    let response = app.request_as_system("GET", "/api/jobs/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["healthy"], false);
    let jobs = response.data()["jobs"].as_array().unwrap();
    let expire = jobs
        .iter()
        .find(|j| j["job_name"] == "subscription-expire")
        .unwrap();
    assert_eq!(expire["healthy"], true);
    let reconcile = jobs
        .iter()
        .find(|j| j["job_name"] == "stock-reconcile")
        .unwrap();
    assert_eq!(reconcile["healthy"], false);
}
