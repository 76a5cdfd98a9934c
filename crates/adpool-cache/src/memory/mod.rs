//! In-memory cache provider using moka.

pub mod store;

pub use store::MemoryCacheProvider;
