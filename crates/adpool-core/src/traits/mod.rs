//! Core traits defined in `adpool-core` and implemented by other crates.

pub mod automation;
pub mod cache;

pub use automation::AutomationBackend;
pub use cache::CacheProvider;
