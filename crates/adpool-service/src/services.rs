//! Service graph wiring.

use std::sync::Arc;

use adpool_core::config::AppConfig;
use adpool_core::traits::automation::AutomationBackend;
use adpool_database::store::Stores;

use crate::allocation::Allocator;
use crate::deletion::DeletionService;
use crate::inventory::{InventoryService, LowStockAlert};
use crate::jobs::{JobName, PeriodicJobs};
use crate::lifecycle::LifecycleService;
use crate::monitor::RunMonitor;
use crate::notification::{EmailSender, NotificationService};
use crate::provision::ProvisioningService;
use crate::queue::QueueResolver;
use crate::reconciliation::ReconciliationEngine;
use crate::revocation::RevocationService;

/// Every service, built once and shared by the API and the worker.
#[derive(Debug, Clone)]
pub struct Services {
    pub notifier: NotificationService,
    pub allocator: Allocator,
    pub resolver: QueueResolver,
    pub revocation: RevocationService,
    pub inventory: InventoryService,
    pub lifecycle: LifecycleService,
    pub reconciliation: ReconciliationEngine,
    pub deletion: DeletionService,
    pub provisioning: ProvisioningService,
    pub monitor: RunMonitor,
    pub jobs: PeriodicJobs,
}

impl Services {
    pub fn new(
        stores: Stores,
        backend: Arc<dyn AutomationBackend>,
        email: Arc<dyn EmailSender>,
        config: &AppConfig,
    ) -> Self {
        let lifecycle_config = config.lifecycle.clone();
        let notifier = NotificationService::new(stores.notifications.clone(), email);
        let stock = LowStockAlert::new(
            stores.sessions.clone(),
            notifier.clone(),
            lifecycle_config.low_stock_threshold,
        );

        let allocator = Allocator::new(
            stores.sessions.clone(),
            stores.adbots.clone(),
            backend.clone(),
            notifier.clone(),
            stock.clone(),
        );
        let resolver = QueueResolver::new(
            stores.adbots.clone(),
            stores.sessions.clone(),
            allocator.clone(),
            notifier.clone(),
        );
        let revocation = RevocationService::new(
            stores.sessions.clone(),
            stores.adbots.clone(),
            backend.clone(),
            resolver.clone(),
        );
        let inventory = InventoryService::new(
            stores.sessions.clone(),
            stores.adbots.clone(),
            backend.clone(),
            resolver.clone(),
            stock,
        );
        let lifecycle = LifecycleService::new(
            stores.adbots.clone(),
            backend.clone(),
            revocation.clone(),
            notifier.clone(),
            lifecycle_config.clone(),
        );
        let reconciliation = ReconciliationEngine::new(
            stores.sessions.clone(),
            stores.adbots.clone(),
            backend.clone(),
            notifier.clone(),
        );
        let deletion = DeletionService::new(
            stores.adbots.clone(),
            backend,
            revocation.clone(),
            allocator.clone(),
            notifier.clone(),
            lifecycle_config.clone(),
        );
        let provisioning =
            ProvisioningService::new(stores.adbots.clone(), allocator.clone(), lifecycle_config);

        let monitored = JobName::ALL
            .into_iter()
            .filter(|job| *job != JobName::QueueSweep || !config.worker.queue_sweep_cron.is_empty())
            .collect();
        let monitor = RunMonitor::new(
            stores.runs,
            notifier.clone(),
            config.monitor.clone(),
            monitored,
        );
        let jobs = PeriodicJobs::new(
            lifecycle.clone(),
            reconciliation.clone(),
            deletion.clone(),
            resolver.clone(),
            monitor.clone(),
        );

        Self {
            notifier,
            allocator,
            resolver,
            revocation,
            inventory,
            lifecycle,
            reconciliation,
            deletion,
            provisioning,
            monitor,
            jobs,
        }
    }
}
