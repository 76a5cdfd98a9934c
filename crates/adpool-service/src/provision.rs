//! Adbot creation at purchase completion.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use adpool_core::config::lifecycle::LifecycleConfig;
use adpool_core::error::AppError;
use adpool_core::result::AppResult;
use adpool_database::store::AdbotStore;
use adpool_entity::adbot::{Adbot, CreateAdbot};

use crate::allocation::{AllocationOutcome, Allocator};

/// A created adbot and its first allocation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    pub adbot: Adbot,
    pub allocation: Option<AllocationOutcome>,
    /// Set when the first allocation failed; the adbot exists regardless.
    pub allocation_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProvisioningService {
    adbots: Arc<dyn AdbotStore>,
    allocator: Allocator,
    config: LifecycleConfig,
}

impl ProvisioningService {
    pub fn new(adbots: Arc<dyn AdbotStore>, allocator: Allocator, config: LifecycleConfig) -> Self {
        Self {
            adbots,
            allocator,
            config,
        }
    }

    pub async fn provision(
        &self,
        owner_ref: &str,
        required_sessions: i32,
        validity_days: Option<i64>,
    ) -> AppResult<ProvisionOutcome> {
        self.provision_at(owner_ref, required_sessions, validity_days, Utc::now())
            .await
    }

    /// Create a STOPPED adbot with an active subscription, then try to
    /// allocate every session it needs.
    pub async fn provision_at(
        &self,
        owner_ref: &str,
        required_sessions: i32,
        validity_days: Option<i64>,
        now: DateTime<Utc>,
    ) -> AppResult<ProvisionOutcome> {
        let owner_ref = owner_ref.trim();
        if owner_ref.is_empty() {
            return Err(AppError::validation("Owner reference must not be empty"));
        }
        if required_sessions < 1 {
            return Err(AppError::validation(format!(
                "Required sessions must be at least 1, got {required_sessions}"
            )));
        }
        let validity_days = validity_days.unwrap_or(self.config.default_validity_days);
        if validity_days < 1 {
            return Err(AppError::validation(format!(
                "Validity must be at least 1 day, got {validity_days}"
            )));
        }

        let expires_at = now + Duration::days(validity_days);
        let adbot = self
            .adbots
            .insert(&CreateAdbot {
                owner_ref: owner_ref.to_string(),
                required_sessions,
                expires_at,
                grace_expires_at: expires_at + self.config.grace_period(),
            })
            .await?;
        info!(
            adbot_id = %adbot.id,
            owner = %owner_ref,
            required_sessions,
            expires_at = %expires_at,
            "Adbot provisioned"
        );

        let (allocation, allocation_error) =
            match self.allocator.allocate(adbot.id, required_sessions).await {
                Ok(outcome) => (Some(outcome), None),
                Err(e) => {
                    warn!(adbot_id = %adbot.id, error = %e, "Initial allocation failed");
                    (None, Some(e.message))
                }
            };

        let adbot = self
            .adbots
            .find_by_id(adbot.id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Adbot {} not found", adbot.id)))?;
        Ok(ProvisionOutcome {
            adbot,
            allocation,
            allocation_error,
        })
    }
}
