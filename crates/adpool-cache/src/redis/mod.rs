//! Redis-backed provider. Counters live server-side, so every node shares them.

mod client;
mod operations;

pub use client::RedisClient;
pub use operations::RedisCacheProvider;
