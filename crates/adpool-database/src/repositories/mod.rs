//! sqlx repository implementations of the store traits.

pub mod adbot;
pub mod cron_run;
pub mod notification;
pub mod session;

pub use adbot::AdbotRepository;
pub use cron_run::CronRunRepository;
pub use notification::NotificationRepository;
pub use session::SessionRepository;
