//! Shared types used across crates.

pub mod automation;
pub mod locator;
pub mod redact;
