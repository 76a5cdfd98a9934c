//! Run log recording and job health.

pub mod service;

pub use service::{HealthReport, RunMonitor};
