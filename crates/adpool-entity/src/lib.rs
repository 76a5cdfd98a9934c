//! # adpool-entity
//!
//! Domain entity models for AdPool. Every struct in this crate represents
//! a database table row or a domain value object. All entities derive
//! `Debug`, `Clone`, `Serialize`, `Deserialize`, and database entities
//! additionally derive `sqlx::FromRow`.

pub mod adbot;
pub mod cron_run;
pub mod notification;
pub mod reconciliation;
pub mod session;
