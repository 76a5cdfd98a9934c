//! Physical locator (session file name) validation.

use crate::error::AppError;
use crate::result::AppResult;

/// Reduce a stored path to its file name, the form the backend uses.
pub fn file_name(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}

/// Reject names that could escape the backend's session directories.
pub fn validate(locator: &str) -> AppResult<()> {
    if locator.trim().is_empty() {
        return Err(AppError::validation("Session locator must not be empty"));
    }
    if locator.contains("..") || locator.contains('/') || locator.contains('\\') {
        return Err(AppError::validation(format!(
            "Invalid session locator '{locator}'"
        )));
    }
    Ok(())
}
