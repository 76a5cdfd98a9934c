//! Adbot provisioning, allocation, and deletion endpoints.

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;
use uuid::Uuid;

use adpool_entity::adbot::AdbotStatus;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_provision_allocates_full_plan() {
    let app = TestApp::new().await;
    app.seed_sessions(3).await;
    let token = app.admin_token();

    let response = app
        .request(
            "POST",
            "/api/adbots",
            Some(json!({"owner_ref": "tenant-1", "required_sessions": 3, "validity_days": 7})),
            Some(&token),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let data = response.data();
    assert_eq!(data["allocation"]["resolved"], true);
    assert_eq!(data["allocation"]["assigned_count"], 3);
    assert_eq!(data["adbot"]["status"], "stopped");
    assert_eq!(data["adbot"]["sessions_assigned"], 3);
    assert_eq!(data["adbot"]["subscription_status"], "active");
}

#[tokio::test]
async fn test_provision_short_pool_queues_with_reason() {
    let app = TestApp::new().await;
    app.seed_sessions(1).await;

    let response = app
        .request_as_system(
            "POST",
            "/api/adbots",
            Some(json!({"owner_ref": "tenant-2", "required_sessions": 4})),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let adbot = &response.data()["adbot"];
    assert_eq!(adbot["status"], "queued");
    assert_eq!(adbot["missing_sessions_count"], 3);
    assert_eq!(
        adbot["queued_reason"],
        "Insufficient sessions. Required: 4, Available: 1, Missing: 3"
    );

    let token = app.admin_token();
    let stats = app.request("GET", "/api/queue/stats", None, Some(&token)).await;
    assert_eq!(stats.data()["total_queued"], 1);
    assert_eq!(stats.data()["total_missing_sessions"], 3);
}

#[tokio::test]
async fn test_provision_rejects_invalid_body() {
    let app = TestApp::new().await;
    let token = app.admin_token();

    let zero = app
        .request(
            "POST",
            "/api/adbots",
            Some(json!({"owner_ref": "tenant-3", "required_sessions": 0})),
            Some(&token),
        )
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);
    assert_eq!(zero.body["error"], "VALIDATION");

    let malformed = app
        .request("POST", "/api/adbots", Some(json!({"owner": 1})), Some(&token))
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.body["error"], "VALIDATION");
}

#[tokio::test]
async fn test_allocate_unknown_and_malformed_ids() {
    let app = TestApp::new().await;
    let token = app.admin_token();

    let unknown = app
        .request(
            "POST",
            &format!("/api/adbots/{}/allocate", Uuid::new_v4()),
            Some(json!({"count": 1})),
            Some(&token),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let malformed = app
        .request(
            "POST",
            "/api/adbots/not-a-uuid/allocate",
            Some(json!({"count": 1})),
            Some(&token),
        )
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.body["error"], "VALIDATION");
}

#[tokio::test]
async fn test_allocate_with_backend_down_is_bad_gateway() {
    let app = TestApp::new().await;
    app.seed_sessions(2).await;
    let adbot = app.seed_adbot(2, Duration::days(30)).await;
    app.backend.set_unavailable(true).await;
    let token = app.admin_token();

    let response = app
        .request(
            "POST",
            &format!("/api/adbots/{}/allocate", adbot.id),
            Some(json!({"count": 2})),
            Some(&token),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.body["error"], "EXTERNAL_SERVICE");
    let stored = app.adbot(adbot.id).await;
    assert_eq!(stored.status, AdbotStatus::Queued);
    assert_eq!(stored.sessions_assigned, 0);
}

#[tokio::test]
async fn test_resolve_requires_queued_adbot() {
    let app = TestApp::new().await;
    let adbot = app.seed_adbot(1, Duration::days(30)).await;
    let token = app.admin_token();

    let response = app
        .request(
            "POST",
            &format!("/api/adbots/{}/resolve", adbot.id),
            None,
            Some(&token),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(
        response.body["message"]
            .as_str()
            .unwrap()
            .contains("concurrent_update")
    );
}

#[tokio::test]
async fn test_soft_delete_then_recover() {
    let app = TestApp::new().await;
    app.seed_sessions(2).await;
    let token = app.admin_token();
    let provisioned = app
        .request(
            "POST",
            "/api/adbots",
            Some(json!({"owner_ref": "tenant-4", "required_sessions": 2})),
            Some(&token),
        )
        .await;
    let id = provisioned.data()["adbot"]["id"].as_str().unwrap().to_string();

    let deleted = app
        .request(
            "POST",
            &format!("/api/adbots/{id}/delete"),
            Some(json!({"reason": "chargeback"})),
            Some(&token),
        )
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.data()["adbot"]["deleted_state"], true);
    assert_eq!(deleted.data()["adbot"]["deleted_by"], "ops-admin");
    assert_eq!(deleted.data()["adbot"]["delete_reason"], "chargeback");
    assert_eq!(
        deleted.data()["revocation"]["released"]
            .as_array()
            .unwrap()
            .len(),
        2
    );

    let again = app
        .request(
            "POST",
            &format!("/api/adbots/{id}/delete"),
            Some(json!({})),
            Some(&token),
        )
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let recovered = app
        .request("POST", &format!("/api/adbots/{id}/recover"), None, Some(&token))
        .await;
    assert_eq!(recovered.status, StatusCode::OK);
    assert_eq!(recovered.data()["adbot"]["deleted_state"], false);
    assert_eq!(recovered.data()["allocation"]["resolved"], true);
    let adbot = app.adbot(id.parse().unwrap()).await;
    assert_eq!(adbot.status, AdbotStatus::Stopped);
    assert_eq!(adbot.sessions_assigned, 2);
}

#[tokio::test]
async fn test_soft_delete_is_admin_only() {
    let app = TestApp::new().await;
    let adbot = app.seed_adbot(1, Duration::days(30)).await;

    let response = app
        .request_as_system(
            "POST",
            &format!("/api/adbots/{}/delete", adbot.id),
            Some(json!({})),
        )
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(!app.adbot(adbot.id).await.deleted_state);
}

#[tokio::test]
async fn test_renew_extends_subscription() {
    let app = TestApp::new().await;
    let adbot = app.seed_adbot(1, Duration::hours(2)).await;

    let response = app
        .request_as_system(
            "POST",
            &format!("/api/adbots/{}/renew", adbot.id),
            Some(json!({"validity_days": 30})),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let renewed = app.adbot(adbot.id).await;
    assert!(renewed.expires_at > adbot.expires_at + Duration::days(29));
    assert_eq!(
        renewed.grace_expires_at,
        renewed.expires_at + app.config.lifecycle.grace_period()
    );
}

#[tokio::test]
async fn test_revoke_returns_sessions_to_pool() {
    let app = TestApp::new().await;
    app.seed_sessions(2).await;
    let token = app.admin_token();
    let provisioned = app
        .request(
            "POST",
            "/api/adbots",
            Some(json!({"owner_ref": "tenant-5", "required_sessions": 2})),
            Some(&token),
        )
        .await;
    let id = provisioned.data()["adbot"]["id"].as_str().unwrap().to_string();

    let response = app
        .request("POST", &format!("/api/adbots/{id}/revoke"), None, Some(&token))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["released"].as_array().unwrap().len(), 2);
    let counts = app.request("GET", "/api/sessions/counts", None, Some(&token)).await;
    assert_eq!(counts.data()["unused"], 2);
    assert_eq!(counts.data()["assigned"], 0);
}

#[tokio::test]
async fn test_permanent_delete_needs_soft_delete_first() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let adbot = app.seed_adbot(1, Duration::days(30)).await;
    let path = format!("/api/adbots/{}", adbot.id);

    let refused = app
        .request("POST", &format!("{path}/permanent-delete"), None, Some(&token))
        .await;
    assert_eq!(refused.status, StatusCode::BAD_REQUEST);

    let deleted = app
        .request(
            "POST",
            &format!("{path}/delete"),
            Some(json!({"reason": "duplicate order"})),
            Some(&token),
        )
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let purged = app
        .request("POST", &format!("{path}/permanent-delete"), None, Some(&token))
        .await;
    assert_eq!(purged.status, StatusCode::OK);
    assert!(app.stores.adbots.find_by_id(adbot.id).await.unwrap().is_none());

    let gone = app
        .request("POST", &format!("{path}/permanent-delete"), None, Some(&token))
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_queue_list_oldest_first() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let mut ids = Vec::new();
    for owner in ["tenant-a", "tenant-b"] {
        let provisioned = app
            .request(
                "POST",
                "/api/adbots",
                Some(json!({"owner_ref": owner, "required_sessions": 2})),
                Some(&token),
            )
            .await;
        ids.push(provisioned.data()["adbot"]["id"].as_str().unwrap().to_string());
    }

    let response = app.request("GET", "/api/queue/list", None, Some(&token)).await;

    assert_eq!(response.status, StatusCode::OK);
    let listed: Vec<&str> = response
        .data()
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, ids);
    assert_eq!(response.data()[0]["missing_sessions_count"], 2);

    let denied = app
        .request("GET", "/api/queue/list", None, Some(&app.user_token()))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
}
