//! Periodic job schedule configuration.

use serde::{Deserialize, Serialize};

/// Cron expressions (six fields, seconds first) for each periodic job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the in-process scheduler is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_pre_expiry_cron")]
    pub pre_expiry_cron: String,
    #[serde(default = "default_expiry_cron")]
    pub expiry_cron: String,
    #[serde(default = "default_grace_cron")]
    pub grace_cron: String,
    #[serde(default = "default_reconcile_cron")]
    pub reconcile_cron: String,
    #[serde(default = "default_permanent_delete_cron")]
    pub permanent_delete_cron: String,
    /// Sweep that retries queued adbots. Empty disables it.
    #[serde(default = "default_queue_sweep_cron")]
    pub queue_sweep_cron: String,
    #[serde(default = "default_health_check_cron")]
    pub health_check_cron: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            pre_expiry_cron: default_pre_expiry_cron(),
            expiry_cron: default_expiry_cron(),
            grace_cron: default_grace_cron(),
            reconcile_cron: default_reconcile_cron(),
            permanent_delete_cron: default_permanent_delete_cron(),
            queue_sweep_cron: default_queue_sweep_cron(),
            health_check_cron: default_health_check_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_pre_expiry_cron() -> String {
    "0 0 * * * *".to_string()
}

fn default_expiry_cron() -> String {
    "0 */15 * * * *".to_string()
}

fn default_grace_cron() -> String {
    "0 */15 * * * *".to_string()
}

fn default_reconcile_cron() -> String {
    "0 0 */6 * * *".to_string()
}

fn default_permanent_delete_cron() -> String {
    "0 30 3 * * *".to_string()
}

fn default_queue_sweep_cron() -> String {
    "0 */30 * * * *".to_string()
}

fn default_health_check_cron() -> String {
    "0 5 * * * *".to_string()
}
