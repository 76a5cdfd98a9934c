//! Route handlers, grouped by resource.

pub mod adbots;
pub mod health;
pub mod jobs;
pub mod queue;
pub mod sessions;
