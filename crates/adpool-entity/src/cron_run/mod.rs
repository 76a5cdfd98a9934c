//! Periodic job run log entities.

pub mod model;

pub use model::{CronRun, JobHealth, RunOutcome, RunStatus};
