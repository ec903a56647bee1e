//! Notification delivery.
//!
//! Notices are shown either through a background worker, when one is
//! attached and running, or directly through the host platform. Whether a
//! notice is shown at all is decided by [`Notifier::is_enabled`] before any
//! delivery strategy is picked.

use crate::error::{DeliveryError, Result};
use crate::storage::KeyValueStorage;
use async_trait::async_trait;
use pensebete_engine::{
    notifications_enabled, Notice, NotificationPreference, NotificationStatus, Permission,
    PermissionRequest, PlatformSupport,
};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Storage key of the saved notification preference.
pub const NOTIFICATIONS_KEY: &str = "pensebete-notifications-enabled";

/// A way to show a notice to the user.
#[async_trait]
pub trait NotificationDelivery: Send + Sync {
    async fn deliver(&self, notice: &Notice) -> std::result::Result<(), DeliveryError>;
}

/// The host's notification facility.
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    fn support(&self) -> PlatformSupport;

    fn permission(&self) -> Permission;

    /// Ask the user for permission. Only valid while it is still undecided.
    async fn request_permission(&self) -> std::result::Result<Permission, DeliveryError>;

    async fn show(&self, notice: &Notice) -> std::result::Result<(), DeliveryError>;
}

/// Delivery straight through the platform.
#[derive(Clone)]
pub struct DirectPlatform {
    platform: Arc<dyn NotificationPlatform>,
}

impl DirectPlatform {
    pub fn new(platform: Arc<dyn NotificationPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl NotificationDelivery for DirectPlatform {
    /// Show the notice, checked against the platform state at call time.
    async fn deliver(&self, notice: &Notice) -> std::result::Result<(), DeliveryError> {
        if !self.platform.support().supported {
            return Err(DeliveryError::Unsupported);
        }
        if self.platform.permission() != Permission::Granted {
            return Err(DeliveryError::PermissionDenied);
        }
        self.platform.show(notice).await
    }
}

/// Message posted to a background worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    ShowNotification { data: Notice },
}

/// Delivery by posting to a background worker.
#[derive(Debug, Clone)]
pub struct WorkerChannel {
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl WorkerChannel {
    pub fn new(tx: mpsc::UnboundedSender<WorkerMessage>) -> Self {
        Self { tx }
    }

    /// Create a channel and the receiving end the worker reads from.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<WorkerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// The worker still listens.
    pub fn is_active(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[async_trait]
impl NotificationDelivery for WorkerChannel {
    async fn deliver(&self, notice: &Notice) -> std::result::Result<(), DeliveryError> {
        self.tx
            .send(WorkerMessage::ShowNotification {
                data: notice.clone(),
            })
            .map_err(|_| DeliveryError::WorkerGone)
    }
}

/// Decides whether notices are shown and routes them to a delivery.
pub struct Notifier {
    platform: Arc<dyn NotificationPlatform>,
    direct: DirectPlatform,
    worker: RwLock<Option<WorkerChannel>>,
    preference: RwLock<Option<NotificationPreference>>,
    storage: Arc<dyn KeyValueStorage>,
}

impl Notifier {
    /// Build a notifier and restore the saved preference.
    pub async fn load(
        platform: Arc<dyn NotificationPlatform>,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Result<Self> {
        let preference = match storage.read(NOTIFICATIONS_KEY).await? {
            Some(raw) => match raw.trim().parse::<NotificationPreference>() {
                Ok(preference) => Some(preference),
                Err(e) => {
                    tracing::warn!("Ignoring saved notification preference: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            direct: DirectPlatform::new(Arc::clone(&platform)),
            platform,
            worker: RwLock::new(None),
            preference: RwLock::new(preference),
            storage,
        })
    }

    pub fn preference(&self) -> Option<NotificationPreference> {
        *self
            .preference
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Notices may be shown right now.
    pub fn is_enabled(&self) -> bool {
        self.platform.support().supported
            && notifications_enabled(self.preference(), self.platform.permission())
    }

    /// Status summary for the UI.
    pub fn status(&self) -> NotificationStatus {
        NotificationStatus::evaluate(self.platform.support(), self.platform.permission())
    }

    async fn save_preference(&self, preference: NotificationPreference) -> Result<()> {
        self.storage
            .write(NOTIFICATIONS_KEY, preference.as_str())
            .await?;
        *self
            .preference
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(preference);
        tracing::debug!("Notification preference set to {}", preference);
        Ok(())
    }

    /// Ask the user for permission and save the answer.
    pub async fn request_permission(&self) -> Result<PermissionRequest> {
        let status = self.status();
        if !status.supported || status.blocked {
            return Ok(PermissionRequest::refused(status.message));
        }

        if status.permission == Permission::Granted {
            self.save_preference(NotificationPreference::Granted).await?;
            return Ok(PermissionRequest::granted());
        }

        let answer = match self.platform.request_permission().await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Permission request failed: {}", e);
                return Ok(PermissionRequest::refused(
                    "Could not request notification permission.",
                ));
            }
        };

        match answer {
            Permission::Granted => self.save_preference(NotificationPreference::Granted).await?,
            Permission::Denied => self.save_preference(NotificationPreference::Denied).await?,
            Permission::Default => {}
        }
        Ok(PermissionRequest::from_answer(answer))
    }

    /// Turn notifications back on. Only possible with a granted permission.
    pub async fn enable(&self) -> Result<bool> {
        if self.platform.permission() != Permission::Granted {
            return Ok(false);
        }
        self.save_preference(NotificationPreference::Granted).await?;
        Ok(true)
    }

    /// Turn notifications off regardless of the permission.
    pub async fn disable(&self) -> Result<()> {
        self.save_preference(NotificationPreference::Disabled).await
    }

    pub fn attach_worker(&self, worker: WorkerChannel) {
        *self
            .worker
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(worker);
        tracing::debug!("Background worker attached");
    }

    pub fn detach_worker(&self) {
        *self
            .worker
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    fn active_worker(&self) -> Option<WorkerChannel> {
        self.worker
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .filter(|worker| worker.is_active())
            .cloned()
    }

    /// Show a notice. Returns whether it was handed to a delivery.
    ///
    /// Delivery failures are logged, never returned.
    pub async fn notify(&self, notice: &Notice) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let result = match self.active_worker() {
            Some(worker) => worker.deliver(notice).await,
            None => self.direct.deliver(notice).await,
        };

        match result {
            Ok(()) => {
                tracing::debug!(reminder_id = %notice.reminder_id, "Delivered notice");
                true
            }
            Err(e) => {
                tracing::warn!(reminder_id = %notice.reminder_id, "Notice delivery failed: {}", e);
                false
            }
        }
    }
}
