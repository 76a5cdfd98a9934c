//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

use adpool_core::error::AppError;
use adpool_entity::session::CreateSession;

/// Run the derived validation rules, mapping failures to a validation error.
pub fn validated<T: Validate>(req: T) -> Result<T, AppError> {
    req.validate()
        .map_err(|e| AppError::validation(format!("Invalid request: {e}")))?;
    Ok(req)
}

/// Create an adbot at purchase completion.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProvisionRequest {
    /// Owning tenant reference.
    #[validate(length(min = 1, max = 255, message = "Owner reference is required"))]
    pub owner_ref: String,
    /// Sessions the plan requires.
    #[validate(range(min = 1, message = "At least one session is required"))]
    pub required_sessions: i32,
    /// Paid period in days. Defaults to the configured validity.
    #[validate(range(min = 1))]
    pub validity_days: Option<i64>,
}

/// Manual allocation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AllocateRequest {
    #[validate(range(min = 1, message = "Count must be at least 1"))]
    pub count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RenewRequest {
    #[validate(range(min = 1, message = "Validity must be at least one day"))]
    pub validity_days: i64,
}

/// Soft delete. An empty reason falls back to the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DeleteAdbotRequest {
    #[serde(default)]
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Register a session file with the pool.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OnboardSessionRequest {
    /// Account identity (phone number).
    #[validate(length(min = 1, max = 64, message = "Identity key is required"))]
    pub identity_key: String,
    /// Bare file name on the automation backend.
    #[validate(length(min = 1, max = 255, message = "Session file name is required"))]
    pub physical_locator: String,
}

/// Bulk import. Items are checked one by one by the service so a bad
/// entry does not reject the batch.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BulkOnboardRequest {
    #[validate(length(min = 1, max = 1000, message = "Between 1 and 1000 sessions per import"))]
    pub sessions: Vec<OnboardSessionRequest>,
}

impl BulkOnboardRequest {
    pub fn into_batch(self) -> Vec<CreateSession> {
        self.sessions
            .into_iter()
            .map(|s| CreateSession {
                identity_key: s.identity_key,
                physical_locator: s.physical_locator,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BanSessionRequest {
    #[validate(length(min = 1, max = 500, message = "Ban reason is required"))]
    pub reason: String,
}
