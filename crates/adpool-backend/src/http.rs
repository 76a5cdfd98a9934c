//! JSON-over-HTTP client for the automation backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use adpool_core::config::backend::BackendConfig;
use adpool_core::error::{AppError, ErrorKind};
use adpool_core::result::AppResult;
use adpool_core::traits::automation::AutomationBackend;
use adpool_core::types::automation::{ExternalListing, VerifyOutcome};

/// Envelope shared by every mutating endpoint.
#[derive(Debug, Deserialize)]
struct Ack {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    sessions: ExternalListing,
}

fn default_success() -> bool {
    true
}

/// HTTP automation backend client.
#[derive(Debug, Clone)]
pub struct HttpAutomationBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAutomationBackend {
    /// Build a client with the configured timeout and optional bearer token.
    pub fn new(config: &BackendConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                AppError::configuration(format!("Invalid backend API token header value: {e}"))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
    ) -> AppResult<T> {
        let response = request.send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Automation backend request to {path} failed: {e}"),
                e,
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(path, status = status.as_u16(), "Automation backend returned an error status");
            return Err(AppError::external(format!(
                "Automation backend returned {status} for {path}: {}",
                truncate(&body, 200)
            )));
        }

        response.json::<T>().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Invalid response from automation backend for {path}"),
                e,
            )
        })
    }

    async fn post_ack(&self, path: &str, body: serde_json::Value) -> AppResult<()> {
        debug!(path, "Calling automation backend");
        let ack: Ack = self
            .send(self.client.post(self.url(path)).json(&body), path)
            .await?;
        if ack.success {
            Ok(())
        } else {
            Err(AppError::external(format!(
                "Automation backend rejected {path}: {}",
                ack.error.unwrap_or_else(|| "unknown error".to_string())
            )))
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl AutomationBackend for HttpAutomationBackend {
    async fn list_sessions(&self) -> AppResult<ExternalListing> {
        let path = "/api/admin/sessions/list";
        let list: ListResponse = self.send(self.client.get(self.url(path)), path).await?;
        if !list.success {
            return Err(AppError::external(format!(
                "Automation backend failed to list sessions: {}",
                list.error.unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        Ok(list.sessions)
    }

    async fn verify(&self, locator: &str) -> AppResult<VerifyOutcome> {
        let path = "/api/admin/sessions/verify";
        self.send(
            self.client
                .post(self.url(path))
                .json(&json!({ "filename": locator })),
            path,
        )
        .await
    }

    async fn assign(&self, locator: &str, owner: &str) -> AppResult<()> {
        self.post_ack(
            "/api/admin/sessions/assign",
            json!({ "filename": locator, "user_id": owner }),
        )
        .await
    }

    async fn unassign(&self, locator: &str, owner: &str) -> AppResult<()> {
        self.post_ack(
            "/api/admin/sessions/unassign",
            json!({ "filename": locator, "user_id": owner }),
        )
        .await
    }

    async fn ban(&self, locator: &str) -> AppResult<()> {
        self.post_ack("/api/admin/sessions/ban", json!({ "filename": locator }))
            .await
    }

    async fn unban(&self, locator: &str) -> AppResult<()> {
        self.post_ack("/api/admin/sessions/unban", json!({ "filename": locator }))
            .await
    }

    async fn stop_execution(&self, owner: &str) -> AppResult<()> {
        self.post_ack("/api/bot/stop", json!({ "user_id": owner }))
            .await
    }

    async fn health_check(&self) -> AppResult<bool> {
        match self.client.get(self.url("/health")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                warn!(error = %e, "Automation backend health check failed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, token: Option<&str>) -> HttpAutomationBackend {
        HttpAutomationBackend::new(&BackendConfig {
            kind: "http".into(),
            base_url: server.uri(),
            api_token: token.map(str::to_string),
            timeout_seconds: 2,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_sessions_parses_partitions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/sessions/list"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "sessions": {
                    "unused": ["a.session"],
                    "assigned": [{ "filename": "b.session", "user_id": "bot-1" }],
                    "banned": ["c.session"]
                }
            })))
            .mount(&server)
            .await;

        let listing = client_for(&server, Some("s3cret"))
            .list_sessions()
            .await
            .unwrap();
        assert_eq!(listing.unused, vec!["a.session".to_string()]);
        assert_eq!(listing.assigned[0].user_id, "bot-1");
        assert_eq!(listing.banned.len(), 1);
        assert!(listing.frozen.is_empty());
    }

    #[tokio::test]
    async fn test_assign_sends_filename_and_owner() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin/sessions/assign"))
            .and(body_json(json!({ "filename": "a.session", "user_id": "bot-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server, None)
            .assign("a.session", "bot-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_ack_is_external_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin/sessions/ban"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": false, "error": "file locked" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, None).ban("a.session").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExternalService);
        assert!(err.message.contains("file locked"));
    }

    #[tokio::test]
    async fn test_error_status_is_external_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin/sessions/verify"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .verify("a.session")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExternalService);
        assert!(err.message.contains("503"));
    }

    #[tokio::test]
    async fn test_verify_reports_missing_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin/sessions/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valid": false,
                "exists": false,
                "reason": "not found"
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server, None).verify("gone.session").await.unwrap();
        assert!(!outcome.exists);
        assert_eq!(outcome.reason.as_deref(), Some("not found"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unhealthy() {
        let client = HttpAutomationBackend::new(&BackendConfig {
            kind: "http".into(),
            base_url: "http://127.0.0.1:9".into(),
            api_token: None,
            timeout_seconds: 1,
        })
        .unwrap();
        assert!(!client.health_check().await.unwrap());
    }
}
