//! Session onboarding, banning, and pool counts.

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use adpool_core::types::automation::ExternalLocation;
use adpool_entity::adbot::AdbotStatus;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_onboarding_serves_queued_adbot() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let provisioned = app
        .request_as_system(
            "POST",
            "/api/adbots",
            Some(json!({"owner_ref": "tenant-1", "required_sessions": 1})),
        )
        .await;
    assert_eq!(provisioned.data()["adbot"]["status"], "queued");
    let adbot_id: Uuid = provisioned.data()["adbot"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    app.backend.put_file("fresh.session", ExternalLocation::Unused).await;
    let response = app
        .request(
            "POST",
            "/api/sessions",
            Some(json!({"identity_key": "+447000099999", "physical_locator": "fresh.session"})),
            Some(&token),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let data = response.data();
    assert_eq!(data["queue"]["resolved"], 1);
    assert_eq!(data["session"]["status"], "assigned");
    assert_eq!(data["session"]["owner_adbot_id"], adbot_id.to_string());

    let adbot = app.adbot(adbot_id).await;
    assert_eq!(adbot.status, AdbotStatus::Stopped);
    assert_eq!(adbot.missing_sessions_count, 0);
    assert!(adbot.queued_reason.is_none());
}

#[tokio::test]
async fn test_onboarding_rejects_path_locator() {
    let app = TestApp::new().await;
    let token = app.admin_token();

    let response = app
        .request(
            "POST",
            "/api/sessions",
            Some(json!({"identity_key": "+447000011111", "physical_locator": "../x"})),
            Some(&token),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION");
    let counts = app.request("GET", "/api/sessions/counts", None, Some(&token)).await;
    assert_eq!(counts.data()["unused"], 0);
}

#[tokio::test]
async fn test_ban_assigned_session_queues_owner() {
    let app = TestApp::new().await;
    app.seed_sessions(2).await;
    let token = app.admin_token();
    let provisioned = app
        .request(
            "POST",
            "/api/adbots",
            Some(json!({"owner_ref": "tenant-2", "required_sessions": 2})),
            Some(&token),
        )
        .await;
    let adbot_id: Uuid = provisioned.data()["adbot"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    let session_id = provisioned.data()["allocation"]["assigned_session_ids"][0]
        .as_str()
        .unwrap()
        .to_string();

    let banned = app
        .request(
            "POST",
            &format!("/api/sessions/{session_id}/ban"),
            Some(json!({"reason": "flagged by provider"})),
            Some(&token),
        )
        .await;
    assert_eq!(banned.status, StatusCode::OK);
    assert_eq!(banned.data()["status"], "banned");
    assert!(banned.data()["owner_adbot_id"].is_null());
    let owner = app.adbot(adbot_id).await;
    assert_eq!(owner.sessions_assigned, 1);
    assert_eq!(owner.status, AdbotStatus::Queued);
    assert_eq!(owner.missing_sessions_count, 1);
    assert_eq!(
        app.backend
            .location(banned.data()["physical_locator"].as_str().unwrap())
            .await,
        Some(ExternalLocation::Banned)
    );

    let again = app
        .request(
            "POST",
            &format!("/api/sessions/{session_id}/ban"),
            Some(json!({"reason": "still flagged"})),
            Some(&token),
        )
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let counts = app.request("GET", "/api/sessions/counts", None, Some(&token)).await;
    assert_eq!(counts.data()["assigned"], 1);
    assert_eq!(counts.data()["banned"], 1);
}

#[tokio::test]
async fn test_unban_returns_session_to_pool() {
    let app = TestApp::new().await;
    let sessions = app.seed_sessions(1).await;
    let token = app.admin_token();
    let path = format!("/api/sessions/{}", sessions[0].id);

    let not_banned = app.request("POST", &format!("{path}/unban"), None, Some(&token)).await;
    assert_eq!(not_banned.status, StatusCode::CONFLICT);

    app.request(
        "POST",
        &format!("{path}/ban"),
        Some(json!({"reason": "manual review"})),
        Some(&token),
    )
    .await;
    let unbanned = app.request("POST", &format!("{path}/unban"), None, Some(&token)).await;

    assert_eq!(unbanned.status, StatusCode::OK);
    assert_eq!(unbanned.data()["status"], "unused");
    let counts = app.request("GET", "/api/sessions/counts", None, Some(&token)).await;
    assert_eq!(counts.data()["unused"], 1);
    assert_eq!(counts.data()["banned"], 0);
}

#[tokio::test]
async fn test_ban_unknown_session_is_not_found() {
    let app = TestApp::new().await;
    let token = app.admin_token();

    let response = app
        .request(
            "POST",
            &format!("/api/sessions/{}/ban", Uuid::new_v4()),
            Some(json!({"reason": "gone"})),
            Some(&token),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_session_routes_require_admin() {
    let app = TestApp::new().await;

    let response = app.request_as_system("GET", "/api/sessions/counts", None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let token = app.user_token();
    let response = app
        .request("GET", "/api/queue/stats", None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bulk_import_skips_known_files_and_serves_queue() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let provisioned = app
        .request(
            "POST",
            "/api/adbots",
            Some(json!({"owner_ref": "tenant-9", "required_sessions": 2})),
            Some(&token),
        )
        .await;
    assert_eq!(provisioned.data()["adbot"]["status"], "queued");
    let queued_id: Uuid = provisioned.data()["adbot"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    let known = app.seed_sessions(1).await;
    for name in ["bulk-1.session", "bulk-2.session"] {
        app.backend.put_file(name, ExternalLocation::Unused).await;
    }

    let response = app
        .request(
            "POST",
            "/api/sessions/bulk",
            Some(json!({"sessions": [
                {"identity_key": "+447000020001", "physical_locator": "bulk-1.session"},
                {"identity_key": "+447000020002", "physical_locator": "bulk-2.session"},
                {"identity_key": "+447000020003", "physical_locator": known[0].physical_locator},
                {"identity_key": "+447000020004", "physical_locator": "nested/bulk.session"},
            ]})),
            Some(&token),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let data = response.data();
    assert_eq!(data["created"].as_array().unwrap().len(), 2);
    assert_eq!(data["skipped"].as_array().unwrap().len(), 1);
    assert_eq!(data["errors"].as_array().unwrap().len(), 1);
    assert_eq!(data["queue"]["resolved"], 1);
    assert_eq!(app.adbot(queued_id).await.status, AdbotStatus::Stopped);

    let empty = app
        .request("POST", "/api/sessions/bulk", Some(json!({"sessions": []})), Some(&token))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
}
