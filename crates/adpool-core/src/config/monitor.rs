//! Job health reader configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Maximum hours allowed between successful runs, per job name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_intervals")]
    pub expected_interval_hours: HashMap<String, i64>,
    /// Fallback for jobs missing from the map.
    #[serde(default = "default_fallback")]
    pub default_interval_hours: i64,
}

impl MonitorConfig {
    /// Expected interval for a job.
    pub fn expected_hours(&self, job_name: &str) -> i64 {
        self.expected_interval_hours
            .get(job_name)
            .copied()
            .unwrap_or(self.default_interval_hours)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            expected_interval_hours: default_intervals(),
            default_interval_hours: default_fallback(),
        }
    }
}

fn default_intervals() -> HashMap<String, i64> {
    [
        ("subscription-expire", 2),
        ("subscription-expire-check", 2),
        ("pre-expiry-notify", 2),
        ("permanent-delete-expired", 26),
        ("stock-reconcile", 7),
        ("queue-sweep", 2),
    ]
    .into_iter()
    .map(|(name, hours)| (name.to_string(), hours))
    .collect()
}

fn default_fallback() -> i64 {
    2
}
