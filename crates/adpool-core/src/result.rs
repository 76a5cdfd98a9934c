//! Convenience result type alias for AdPool.

use crate::error::AppError;

/// A specialized `Result` type for AdPool operations.
pub type AppResult<T> = Result<T, AppError>;
