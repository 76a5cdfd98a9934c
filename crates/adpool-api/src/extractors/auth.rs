//! Credential extractors for the trigger surface.
//!
//! Administrators present `Authorization: Bearer <jwt>`; schedulers present
//! `X-System-Secret`. Every failed authentication counts against the
//! caller's address in the shared rate limiter, and a successful one
//! clears the count.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use adpool_auth::RateDecision;
use adpool_core::error::{AppError, ErrorKind};
use adpool_service::Actor;

use crate::error::ApiError;
use crate::state::AppState;

/// Rate limiter scope for failed trigger credentials.
pub const TRIGGER_AUTH_SCOPE: &str = "trigger-auth";

const SYSTEM_SECRET_HEADER: &str = "x-system-secret";

/// Caller holding an administrator token.
#[derive(Debug, Clone)]
pub struct AdminOnly(pub Actor);

/// Caller holding an administrator token or the system secret.
#[derive(Debug, Clone)]
pub struct AdminOrSystem(pub Actor);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Admin,
    AdminOrSystem,
}

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, Access::Admin).await.map(AdminOnly)
    }
}

impl FromRequestParts<AppState> for AdminOrSystem {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, Access::AdminOrSystem)
            .await
            .map(AdminOrSystem)
    }
}

async fn authenticate(parts: &Parts, state: &AppState, access: Access) -> Result<Actor, ApiError> {
    let client = client_address(parts);

    match state.limiter.peek(TRIGGER_AUTH_SCOPE, &client).await {
        Ok(RateDecision::Limited { retry_after }) => {
            return Err(ApiError::rate_limited(retry_after));
        }
        Ok(RateDecision::Allowed { .. }) => {}
        Err(e) => tracing::warn!(client = %client, error = %e, "Rate limiter unavailable"),
    }

    match verify(parts, state, access) {
        Ok(actor) => {
            if let Err(e) = state.limiter.reset(TRIGGER_AUTH_SCOPE, &client).await {
                tracing::warn!(client = %client, error = %e, "Failed to reset rate limit counter");
            }
            Ok(actor)
        }
        Err(e) if e.kind == ErrorKind::Authentication => {
            tracing::warn!(client = %client, reason = %e.message, "Trigger authentication failed");
            match state.limiter.check(TRIGGER_AUTH_SCOPE, &client).await {
                Ok(RateDecision::Limited { retry_after }) => Err(ApiError::rate_limited(retry_after)),
                Ok(RateDecision::Allowed { .. }) => Err(e.into()),
                Err(limit_err) => {
                    tracing::warn!(client = %client, error = %limit_err, "Rate limiter unavailable");
                    Err(e.into())
                }
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn verify(parts: &Parts, state: &AppState, access: Access) -> Result<Actor, AppError> {
    if let Some(secret) = header_str(parts, SYSTEM_SECRET_HEADER) {
        if !state.system_secret.verify(secret) {
            return Err(AppError::authentication("Invalid system secret"));
        }
        return match access {
            Access::AdminOrSystem => Ok(Actor::System),
            Access::Admin => Err(AppError::authorization("Administrator token required")),
        };
    }

    let header = header_str(parts, AUTHORIZATION.as_str())
        .ok_or_else(|| AppError::authentication("Missing credentials"))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::authentication("Invalid Authorization header format"))?;

    let claims = state.jwt_decoder.decode_admin(token)?;
    Ok(Actor::Admin { subject: claims.sub })
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

/// First `X-Forwarded-For` hop, else the peer address.
fn client_address(parts: &Parts) -> String {
    if let Some(forwarded) = header_str(parts, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/jobs/expire");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_client_address_prefers_first_forwarded_hop() {
        let p = parts(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(client_address(&p), "203.0.113.7");
    }

    #[test]
    fn test_client_address_falls_back_to_peer() {
        let mut p = parts(&[]);
        assert_eq!(client_address(&p), "unknown");

        p.extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 40000))));
        assert_eq!(client_address(&p), "192.0.2.1");
    }
}
