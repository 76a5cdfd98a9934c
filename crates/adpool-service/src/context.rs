//! Who is acting on a trigger.

use serde::{Deserialize, Serialize};

/// The authenticated caller of a trigger.
///
/// Extracted by the API layer and passed to service methods that record
/// who acted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    /// An operator holding an administrator token.
    Admin { subject: String },
    /// A scheduler presenting the system secret, or the in-process worker.
    System,
}

impl Actor {
    /// Reference recorded in audit columns such as `deleted_by`.
    pub fn reference(&self) -> String {
        match self {
            Self::Admin { subject } => subject.clone(),
            Self::System => "system".to_string(),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin { .. })
    }
}
