//! Pure subscription transition evaluator.
//!
//! Given the stored timestamps, the subscription status, the sent flags
//! and the current time, decides the single transition that is due. The
//! sent flags make the answer `None` once a transition has been applied,
//! so re-evaluating at the same `now` never repeats a side effect.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use adpool_entity::adbot::{Adbot, SubscriptionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    None,
    /// Still active, expiring within the warning window.
    PreExpiryWarning,
    /// `ACTIVE → EXPIRED`.
    Expire,
    /// `EXPIRED → DELETED`.
    Delete,
}

/// Decide which transition is due for `adbot` at `now`.
pub fn evaluate(adbot: &Adbot, now: DateTime<Utc>, pre_expiry_window: Duration) -> Transition {
    match adbot.subscription_status {
        SubscriptionStatus::Deleted => Transition::None,
        SubscriptionStatus::Expired => {
            if now > adbot.grace_expires_at && !adbot.deletion_notification_sent {
                Transition::Delete
            } else {
                Transition::None
            }
        }
        SubscriptionStatus::Active => {
            if now > adbot.expires_at {
                if adbot.expiry_notification_sent {
                    Transition::None
                } else {
                    Transition::Expire
                }
            } else if adbot.expires_at <= now + pre_expiry_window
                && !adbot.pre_expiry_notification_sent
            {
                Transition::PreExpiryWarning
            } else {
                Transition::None
            }
        }
    }
}

/// Whole hours left until `expires_at`, rounded up.
pub fn hours_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (expires_at - now).num_seconds().max(0);
    (seconds + 3599) / 3600
}
