//! Notification sink used by every service.
//!
//! Sending is fire-and-forget: a failed insert or email is logged and
//! never propagates into the state transition that triggered it.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use adpool_core::result::AppResult;
use adpool_database::store::NotificationStore;
use adpool_entity::adbot::Adbot;
use adpool_entity::notification::{NewNotification, Notification, NotificationKind};

use super::email::{EmailMessage, EmailSender};

/// Stores in-app notifications and forwards emails.
#[derive(Debug, Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    email: Arc<dyn EmailSender>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, email: Arc<dyn EmailSender>) -> Self {
        Self { store, email }
    }

    /// Store a notification, logging instead of failing.
    pub async fn send(&self, notification: NewNotification) {
        let title = notification.title.clone();
        match self.store.insert(&notification).await {
            Ok(stored) => debug!(notification_id = %stored.id, title = %title, "Notification stored"),
            Err(e) => warn!(title = %title, error = %e, "Failed to store notification"),
        }
    }

    /// Notify the owner of an adbot.
    pub async fn notify_owner(
        &self,
        adbot: &Adbot,
        kind: NotificationKind,
        title: &str,
        message: impl Into<String>,
    ) {
        self.send(NewNotification::to_owner(
            &adbot.owner_ref,
            adbot.id,
            kind,
            title,
            message,
        ))
        .await;
    }

    /// Broadcast to operators.
    pub async fn alert_admins(
        &self,
        kind: NotificationKind,
        title: &str,
        message: impl Into<String>,
        adbot_id: Option<Uuid>,
    ) {
        let mut notification = NewNotification::to_admins(kind, title, message);
        notification.adbot_id = adbot_id;
        self.send(notification).await;
    }

    /// Hand an email to the sender, logging instead of failing.
    pub async fn email(
        &self,
        adbot: &Adbot,
        template: &str,
        subject: &str,
        variables: serde_json::Value,
    ) {
        let message = EmailMessage {
            recipient: adbot.owner_ref.clone(),
            subject: subject.to_string(),
            template: template.to_string(),
            variables,
        };
        if let Err(e) = self.email.send(&message).await {
            warn!(
                adbot_id = %adbot.id,
                template = %template,
                error = %e,
                "Failed to send email"
            );
        }
    }

    pub async fn recent(&self, limit: i64) -> AppResult<Vec<Notification>> {
        self.store.list_recent(limit).await
    }

    pub async fn for_adbot(&self, adbot_id: Uuid) -> AppResult<Vec<Notification>> {
        self.store.list_for_adbot(adbot_id).await
    }
}
