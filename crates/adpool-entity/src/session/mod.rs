//! Session (automation identity) entities.

pub mod model;
pub mod status;

pub use model::{CreateSession, PoolCounts, Session};
pub use status::SessionStatus;
