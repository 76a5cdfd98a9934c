//! In-app notifications and best-effort email.

pub mod email;
pub mod service;

pub use email::{EmailMessage, EmailSender, LogEmailSender};
pub use service::NotificationService;
