//! Subscription lifecycle and pool settings.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Timing windows for the subscription lifecycle and the session pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Hours between subscription expiry and grace deletion.
    #[serde(default = "default_grace")]
    pub grace_period_hours: i64,
    /// Hours before expiry at which the pre-expiry warning is sent.
    #[serde(default = "default_pre_expiry")]
    pub pre_expiry_warning_hours: i64,
    /// Days a soft-deleted adbot stays recoverable.
    #[serde(default = "default_retention")]
    pub soft_delete_retention_days: i64,
    /// UNUSED count at or below which a low-stock alert is raised.
    #[serde(default = "default_low_stock")]
    pub low_stock_threshold: i64,
    /// Validity used when a purchase or renewal does not specify one.
    #[serde(default = "default_validity")]
    pub default_validity_days: i64,
}

impl LifecycleConfig {
    /// Grace window as a duration.
    pub fn grace_period(&self) -> Duration {
        Duration::hours(self.grace_period_hours)
    }

    /// Pre-expiry warning lead time as a duration.
    pub fn pre_expiry_window(&self) -> Duration {
        Duration::hours(self.pre_expiry_warning_hours)
    }

    /// Soft-delete recovery window as a duration.
    pub fn soft_delete_retention(&self) -> Duration {
        Duration::days(self.soft_delete_retention_days)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            grace_period_hours: default_grace(),
            pre_expiry_warning_hours: default_pre_expiry(),
            soft_delete_retention_days: default_retention(),
            low_stock_threshold: default_low_stock(),
            default_validity_days: default_validity(),
        }
    }
}

fn default_grace() -> i64 {
    24
}

fn default_pre_expiry() -> i64 {
    48
}

fn default_retention() -> i64 {
    10
}

fn default_low_stock() -> i64 {
    10
}

fn default_validity() -> i64 {
    30
}
