//! # adpool-database
//!
//! PostgreSQL connection management, the store traits the service layer
//! depends on, and their sqlx implementations. The `memory` feature adds
//! an in-process implementation with the same compare-and-set semantics.

pub mod connection;
pub mod migration;
pub mod repositories;
pub mod store;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

pub use connection::DatabasePool;
pub use store::{AdbotStore, NotificationStore, RunLogStore, SessionStore, Stores};
