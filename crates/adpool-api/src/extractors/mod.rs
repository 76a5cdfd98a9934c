//! Custom Axum extractors.

pub mod auth;
pub mod body;

pub use auth::{AdminOnly, AdminOrSystem, TRIGGER_AUTH_SCOPE};
pub use body::{IdPath, JsonBody};
