//! # adpool-api
//!
//! HTTP trigger surface for AdPool built on Axum.
//!
//! Exposes the periodic jobs to external schedulers and the pool and
//! adbot operations to administrators. Provides the credential
//! extractors, request DTOs, and the mapping from `AppError` to HTTP.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, serve};
pub use error::ApiError;
pub use state::AppState;
