//! Result of one allocation attempt.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an allocation call achieved. A shortfall is not an error: the
/// adbot is queued and `resolved` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub adbot_id: Uuid,
    /// Sessions claimed and confirmed by the backend in this call.
    pub assigned_count: i32,
    /// Sessions the adbot is still owed after this call.
    pub missing_count: i32,
    pub resolved: bool,
    pub assigned_session_ids: Vec<Uuid>,
}

impl AllocationOutcome {
    pub(crate) fn new(adbot_id: Uuid, assigned_session_ids: Vec<Uuid>, missing_count: i32) -> Self {
        Self {
            adbot_id,
            assigned_count: i32::try_from(assigned_session_ids.len()).unwrap_or(i32::MAX),
            missing_count,
            resolved: missing_count == 0,
            assigned_session_ids,
        }
    }
}
