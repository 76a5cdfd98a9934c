//! Adbot (tenant execution unit) entities.

pub mod model;
pub mod state;
pub mod status;

pub use model::{Adbot, CreateAdbot};
pub use state::{AdbotState, StatusFlags};
pub use status::{AdbotStatus, SubscriptionStatus};
