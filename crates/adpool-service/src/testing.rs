//! Fixtures over the in-memory stores and backend.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use adpool_backend::memory::MemoryAutomationBackend;
use adpool_core::config::AppConfig;
use adpool_core::types::automation::ExternalLocation;
use adpool_database::store::Stores;
use adpool_entity::adbot::{Adbot, CreateAdbot};
use adpool_entity::notification::Notification;
use adpool_entity::session::{CreateSession, PoolCounts, Session};

use crate::notification::LogEmailSender;
use crate::services::Services;

pub(crate) struct Harness {
    pub stores: Stores,
    pub backend: Arc<MemoryAutomationBackend>,
    pub services: Services,
    pub config: AppConfig,
}

impl Harness {
    pub async fn new() -> Self {
        let config = AppConfig::default();
        let stores = Stores::memory();
        let backend = Arc::new(MemoryAutomationBackend::new());
        let services = Services::new(
            stores.clone(),
            backend.clone(),
            Arc::new(LogEmailSender),
            &config,
        );
        Self {
            stores,
            backend,
            services,
            config,
        }
    }

    /// Register `n` UNUSED sessions with matching backend files, without
    /// triggering a queue pass.
    pub async fn seed_sessions(&self, n: usize) -> Vec<Session> {
        let mut seeded = Vec::with_capacity(n);
        for _ in 0..n {
            let name = format!("{}.session", Uuid::new_v4().simple());
            let session = self
                .stores
                .sessions
                .insert(&CreateSession {
                    identity_key: format!("+1555{:07}", seeded.len()),
                    physical_locator: name.clone(),
                })
                .await
                .unwrap();
            self.backend.put_file(&name, ExternalLocation::Unused).await;
            seeded.push(session);
        }
        seeded
    }

    /// Insert a STOPPED adbot expiring `expires_in` from now, with the
    /// configured grace window after that.
    pub async fn seed_adbot(&self, required: i32, expires_in: Duration) -> Adbot {
        let expires_at = Utc::now() + expires_in;
        self.stores
            .adbots
            .insert(&CreateAdbot {
                owner_ref: format!("owner-{}", Uuid::new_v4().simple()),
                required_sessions: required,
                expires_at,
                grace_expires_at: expires_at + self.config.lifecycle.grace_period(),
            })
            .await
            .unwrap()
    }

    pub async fn find_adbot(&self, id: Uuid) -> Option<Adbot> {
        self.stores.adbots.find_by_id(id).await.unwrap()
    }

    pub async fn adbot(&self, id: Uuid) -> Adbot {
        self.find_adbot(id).await.unwrap()
    }

    pub async fn session(&self, id: Uuid) -> Session {
        self.stores.sessions.find_by_id(id).await.unwrap().unwrap()
    }

    pub async fn owned_by(&self, adbot_id: Uuid) -> Vec<Session> {
        self.stores.sessions.list_owned_by(adbot_id).await.unwrap()
    }

    pub async fn counts(&self) -> PoolCounts {
        self.stores.sessions.count_by_status().await.unwrap()
    }

    async fn all_notifications(&self) -> Vec<Notification> {
        self.stores
            .notifications
            .list_recent(10_000)
            .await
            .unwrap()
    }

    pub async fn notification_count(&self) -> usize {
        self.all_notifications().await.len()
    }

    pub async fn admin_titles(&self) -> Vec<String> {
        self.all_notifications()
            .await
            .into_iter()
            .filter(Notification::is_broadcast)
            .map(|n| n.title)
            .collect()
    }

    /// Owner-addressed notifications about one adbot, oldest first.
    pub async fn owner_notifications(&self, adbot_id: Uuid) -> Vec<Notification> {
        let mut notes: Vec<Notification> = self
            .stores
            .notifications
            .list_for_adbot(adbot_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| !n.is_broadcast())
            .collect();
        notes.sort_by_key(|n| n.created_at);
        notes
    }

    pub async fn owner_titles(&self, adbot_id: Uuid) -> Vec<String> {
        self.owner_notifications(adbot_id)
            .await
            .into_iter()
            .map(|n| n.title)
            .collect()
    }
}
