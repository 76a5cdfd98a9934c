//! Subscription lifecycle: pre-expiry warning, expiry, grace deletion and
//! renewal.

pub mod machine;
pub mod renewal;
pub mod service;

pub use machine::Transition;
pub use service::{LifecycleService, TransitionSummary};
