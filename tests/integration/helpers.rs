//! Shared test helpers for integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use adpool_api::AppState;
use adpool_auth::JwtEncoder;
use adpool_backend::MemoryAutomationBackend;
use adpool_cache::memory::MemoryCacheProvider;
use adpool_core::config::AppConfig;
use adpool_core::config::cache::MemoryCacheConfig;
use adpool_core::types::automation::ExternalLocation;
use adpool_database::store::Stores;
use adpool_entity::adbot::{Adbot, CreateAdbot};
use adpool_entity::session::{CreateSession, Session};
use adpool_service::{LogEmailSender, Services};

pub const SYSTEM_SECRET: &str = "scheduler-secret";

/// Test application over in-memory stores and backend
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Stores for direct seeding and assertions
    pub stores: Stores,
    /// Automation backend stand-in
    pub backend: Arc<MemoryAutomationBackend>,
    /// Application config
    pub config: AppConfig,
    encoder: JwtEncoder,
}

impl TestApp {
    /// Create a new test application
    pub async fn new() -> Self {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "integration-test-secret".to_string();
        config.auth.system_secret = Some(SYSTEM_SECRET.to_string());
        config.rate_limit.auth_max_attempts = 3;
        Self::with_config(config)
    }

    pub fn with_config(config: AppConfig) -> Self {
        let stores = Stores::memory();
        let backend = Arc::new(MemoryAutomationBackend::new());
        let services = Services::new(
            stores.clone(),
            backend.clone(),
            Arc::new(LogEmailSender),
            &config,
        );
        let cache = Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig::default()));
        let state = AppState::new(Arc::new(config.clone()), services, cache, backend.clone());
        let router = adpool_api::build_app(state);

        Self {
            router,
            stores,
            backend,
            encoder: JwtEncoder::new(&config.auth),
            config,
        }
    }

    /// Token carrying the administrator role
    pub fn admin_token(&self) -> String {
        self.encoder
            .issue("ops-admin", &self.config.auth.admin_role, Duration::minutes(30))
            .expect("Failed to sign admin token")
    }

    /// Validly signed token without the administrator role
    pub fn user_token(&self) -> String {
        self.encoder
            .issue("some-user", "user", Duration::minutes(30))
            .expect("Failed to sign user token")
    }

    /// Register `n` UNUSED sessions with matching backend files
    pub async fn seed_sessions(&self, n: usize) -> Vec<Session> {
        let mut seeded = Vec::with_capacity(n);
        for i in 0..n {
            let name = format!("{}.session", Uuid::new_v4().simple());
            let session = self
                .stores
                .sessions
                .insert(&CreateSession {
                    identity_key: format!("+4470000{i:05}"),
                    physical_locator: name.clone(),
                })
                .await
                .expect("Failed to seed session");
            self.backend.put_file(&name, ExternalLocation::Unused).await;
            seeded.push(session);
        }
        seeded
    }

    /// Insert a STOPPED adbot expiring `expires_in` from now
    pub async fn seed_adbot(&self, required: i32, expires_in: Duration) -> Adbot {
        let expires_at = Utc::now() + expires_in;
        self.stores
            .adbots
            .insert(&CreateAdbot {
                owner_ref: format!("owner-{}", Uuid::new_v4().simple()),
                required_sessions: required,
                expires_at,
                grace_expires_at: expires_at + self.config.lifecycle.grace_period(),
            })
            .await
            .expect("Failed to seed adbot")
    }

    pub async fn adbot(&self, id: Uuid) -> Adbot {
        self.stores
            .adbots
            .find_by_id(id)
            .await
            .expect("Failed to load adbot")
            .expect("Adbot not found")
    }

    /// Make an HTTP request with a bearer token
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let bearer = token.map(|t| format!("Bearer {t}"));
        let headers: Vec<(&str, &str)> = bearer
            .as_deref()
            .map(|b| vec![("Authorization", b)])
            .unwrap_or_default();
        self.request_with_headers(method, path, body, &headers).await
    }

    /// Make an HTTP request presenting the system secret
    pub async fn request_as_system(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        self.request_with_headers(method, path, body, &[("X-System-Secret", SYSTEM_SECRET)])
            .await
    }

    /// Make an HTTP request with arbitrary headers
    pub async fn request_with_headers(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");
        for (name, value) in headers {
            req = req.header(*name, *value);
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            body,
            retry_after,
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
    /// `Retry-After` header, if present
    pub retry_after: Option<String>,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}
