//! Pool-growing events and stock visibility.

pub mod service;
pub mod stock;

pub use service::{BulkOnboardOutcome, InventoryService, OnboardOutcome};
pub use stock::LowStockAlert;
