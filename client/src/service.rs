//! Wiring of the client components and their background tasks.

use crate::clock::Clock;
use crate::connectivity::{spawn_probe_loop, ConnectivityMonitor, ConnectivityProbe};
use crate::coordinator::SyncCoordinator;
use crate::error::Result;
use crate::notify::{NotificationPlatform, Notifier};
use crate::queue::DurableQueue;
use crate::reminders::{NotifiedCache, ReminderScheduler, ReminderStore, SchedulerConfig};
use crate::remote::{RemoteReminders, RemoteTables};
use crate::shutdown::{shutdown_channel, ShutdownTrigger};
use crate::storage::KeyValueStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// External collaborators of the service.
pub struct ServiceDeps {
    pub storage: Arc<dyn KeyValueStorage>,
    pub tables: Arc<dyn RemoteTables>,
    pub reminders: Arc<dyn RemoteReminders>,
    pub platform: Arc<dyn NotificationPlatform>,
    /// Active reachability check; without one the host reports connectivity
    pub probe: Option<Arc<dyn ConnectivityProbe>>,
    pub clock: Arc<dyn Clock>,
}

/// Background task settings.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub scheduler: SchedulerConfig,
    /// Period of the background drain retry; `None` disables it
    pub retry_interval: Option<Duration>,
    /// Period of the reachability probe; `None` disables it
    pub probe_interval: Option<Duration>,
    pub initially_online: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            retry_interval: Some(Duration::from_secs(300)),
            probe_interval: None,
            initially_online: true,
        }
    }
}

/// Running sync client.
pub struct SyncService {
    coordinator: Arc<SyncCoordinator>,
    scheduler: Arc<ReminderScheduler>,
    notifier: Arc<Notifier>,
    connectivity: ConnectivityMonitor,
    shutdown: ShutdownTrigger,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncService {
    /// Restore durable state and start the background tasks.
    pub async fn start(deps: ServiceDeps, settings: ServiceSettings) -> Result<Self> {
        let queue = DurableQueue::load(Arc::clone(&deps.storage)).await?;
        let notified = NotifiedCache::load(Arc::clone(&deps.storage)).await?;
        let notifier = Arc::new(Notifier::load(deps.platform, Arc::clone(&deps.storage)).await?);

        let connectivity = ConnectivityMonitor::new(settings.initially_online);
        let coordinator = Arc::new(SyncCoordinator::new(
            queue,
            deps.tables,
            connectivity.clone(),
            Arc::clone(&deps.clock),
        ));
        let scheduler = Arc::new(ReminderScheduler::new(
            ReminderStore::new(deps.reminders),
            notified,
            Arc::clone(&notifier),
            deps.clock,
            settings.scheduler,
        ));

        let (shutdown, signal) = shutdown_channel();
        let mut tasks = vec![
            coordinator.spawn_reconnect_listener(signal.clone()),
            scheduler.spawn(signal.clone()),
        ];
        if let Some(period) = settings.retry_interval {
            tasks.push(coordinator.spawn_retry_timer(period, signal.clone()));
        }
        if let (Some(probe), Some(period)) = (deps.probe, settings.probe_interval) {
            tasks.push(spawn_probe_loop(connectivity.clone(), probe, period, signal.clone()));
        }

        if connectivity.is_online() {
            let initial = Arc::clone(&coordinator);
            tasks.push(tokio::spawn(async move {
                if let Err(e) = initial.drain().await {
                    tracing::error!("Initial drain failed: {}", e);
                }
            }));
        }

        tracing::info!(
            pending = coordinator.status().pending_count,
            online = connectivity.is_online(),
            "Sync service started"
        );

        Ok(Self {
            coordinator,
            scheduler,
            notifier,
            connectivity,
            shutdown,
            tasks,
        })
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Stop the background tasks and wait for them.
    ///
    /// A drain in flight finishes its current operation first.
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!("Background task ended abnormally: {}", e);
            }
        }
        tracing::info!("Sync service stopped");
    }
}
