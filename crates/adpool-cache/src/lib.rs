//! # adpool-cache
//!
//! Cache provider implementations for AdPool. Supports two modes:
//!
//! - **memory**: In-process cache using [moka](https://crates.io/crates/moka),
//!   suitable for a single node only
//! - **redis**: Redis-backed cache shared by every node
//!
//! The provider is selected at runtime based on configuration. Counters
//! used for rate limiting must live in Redis once more than one process
//! serves the trigger surface.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::CacheManager;
