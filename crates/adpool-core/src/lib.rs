//! # adpool-core
//!
//! Shared foundation for the AdPool crates: the layered configuration,
//! `AppError` and its kinds, the cache and automation-backend seams, and
//! the types describing what the backend reports about session files.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
