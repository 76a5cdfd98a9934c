//! Outbound email seam.
//!
//! Delivery lives outside this system; the pool only hands over a
//! template name and its variables.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use adpool_core::result::AppResult;

/// An email about to be handed to the delivery provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Owner reference; the provider resolves it to an address.
    pub recipient: String,
    pub subject: String,
    /// Template name, e.g. `"expiry"`.
    pub template: String,
    pub variables: serde_json::Value,
}

#[async_trait]
pub trait EmailSender: Send + Sync + std::fmt::Debug + 'static {
    async fn send(&self, message: &EmailMessage) -> AppResult<()>;
}

/// Sender that only logs; used when no provider is wired in.
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        info!(
            recipient = %message.recipient,
            template = %message.template,
            subject = %message.subject,
            "Email queued for delivery"
        );
        Ok(())
    }
}
