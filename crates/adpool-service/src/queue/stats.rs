//! Queue statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use adpool_entity::adbot::Adbot;

/// Aggregate view of the allocation queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_queued: usize,
    pub total_missing_sessions: i64,
    pub oldest_queued_at: Option<DateTime<Utc>>,
}

impl QueueStats {
    pub fn from_queued(queued: &[Adbot]) -> Self {
        Self {
            total_queued: queued.len(),
            total_missing_sessions: queued
                .iter()
                .map(|a| i64::from(a.missing_sessions_count))
                .sum(),
            oldest_queued_at: queued.iter().filter_map(|a| a.queued_at).min(),
        }
    }
}
