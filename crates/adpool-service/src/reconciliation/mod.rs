//! Registry versus backend reconciliation.

pub mod engine;

pub use engine::{ReconciliationEngine, run_outcome};
