//! Subscription renewal.

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use adpool_core::error::AppError;
use adpool_core::result::AppResult;
use adpool_entity::adbot::{Adbot, SubscriptionStatus};

use super::service::LifecycleService;

impl LifecycleService {
    pub async fn renew(&self, adbot_id: Uuid, validity_days: i64) -> AppResult<Adbot> {
        self.renew_at(adbot_id, validity_days, Utc::now()).await
    }

    /// Start a new paid period of `validity_days` from `now` and reset
    /// all three notification flags. A deleted subscription or a
    /// soft-deleted adbot cannot be renewed.
    pub async fn renew_at(
        &self,
        adbot_id: Uuid,
        validity_days: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Adbot> {
        if validity_days < 1 {
            return Err(AppError::validation(format!(
                "Validity must be at least 1 day, got {validity_days}"
            )));
        }

        let adbot = self
            .adbots
            .find_by_id(adbot_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Adbot {adbot_id} not found")))?;
        if adbot.subscription_status == SubscriptionStatus::Deleted {
            return Err(AppError::conflict(format!(
                "Subscription of adbot {adbot_id} was deleted and cannot be renewed"
            )));
        }
        if adbot.deleted_state {
            return Err(AppError::conflict(format!(
                "Adbot {adbot_id} is soft-deleted; recover it before renewing"
            )));
        }

        let expires_at = now + Duration::days(validity_days);
        let grace_expires_at = expires_at + self.config.grace_period();
        if !self
            .adbots
            .renew(adbot_id, expires_at, grace_expires_at, now)
            .await?
        {
            return Err(AppError::conflict(format!(
                "concurrent_update: adbot {adbot_id} changed during renewal"
            )));
        }
        info!(adbot_id = %adbot_id, expires_at = %expires_at, "Subscription renewed");

        self.adbots
            .find_by_id(adbot_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Adbot {adbot_id} not found")))
    }
}
