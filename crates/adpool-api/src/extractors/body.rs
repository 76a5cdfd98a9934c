//! Path and body extractors that reject with the JSON error body.

use axum::Json;
use axum::extract::Path;
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::error::ApiError;

/// A single `{id}` path segment parsed as a UUID.
pub type IdPath = WithRejection<Path<Uuid>, ApiError>;

/// A JSON request body.
pub type JsonBody<T> = WithRejection<Json<T>, ApiError>;
