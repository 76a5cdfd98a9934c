//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Severity shown alongside a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// A stored in-app notification.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    /// Recipient owner reference. `None` is an operator broadcast.
    pub recipient: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Adbot the notification is about, if any.
    pub adbot_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_none()
    }
}

/// Data for a notification about to be sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub adbot_id: Option<Uuid>,
}

impl NewNotification {
    /// Notification addressed to an adbot owner.
    pub fn to_owner(
        owner_ref: &str,
        adbot_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient: Some(owner_ref.to_string()),
            kind,
            title: title.into(),
            message: message.into(),
            adbot_id: Some(adbot_id),
        }
    }

    /// Operator-facing broadcast.
    pub fn to_admins(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient: None,
            kind,
            title: title.into(),
            message: message.into(),
            adbot_id: None,
        }
    }

    pub fn about(mut self, adbot_id: Uuid) -> Self {
        self.adbot_id = Some(adbot_id);
        self
    }
}
