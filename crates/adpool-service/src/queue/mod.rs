//! Retry allocation for queued adbots.

pub mod resolver;
pub mod stats;

pub use resolver::{QueueResolver, ResolveSummary};
pub use stats::QueueStats;
