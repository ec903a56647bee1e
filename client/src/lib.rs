//! # Pensebête Sync
//!
//! Offline-first sync client for Pensebête lists.
//!
//! User changes are queued durably on the device and replayed against the
//! remote store in the order they were made, once connectivity allows. The
//! same client watches the owner's reminders and shows a notification when
//! one comes due.
//!
//! ## Components
//!
//! - [`DurableQueue`] - the engine's pending queue, persisted after every change
//! - [`SyncCoordinator`] - drains the queue against [`RemoteTables`]
//! - [`ConnectivityMonitor`] - online/offline flag that triggers drains
//! - [`ReminderScheduler`] - periodic reminder check over [`RemoteReminders`]
//! - [`Notifier`] - permission handling and notification delivery
//! - [`SyncService`] - wires all of the above and owns the background tasks
//!
//! Hosts plug in storage ([`KeyValueStorage`]), the notification facility
//! ([`NotificationPlatform`]) and the remote store. [`FileStorage`] and
//! [`HttpRemoteStore`] are the production implementations.

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod queue;
pub mod reminders;
pub mod remote;
pub mod service;
pub mod shutdown;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError};
pub use connectivity::{ConnectivityMonitor, ConnectivityProbe, ConnectivityState, Transition};
pub use coordinator::{
    AppliedOperation, BlockedOperation, DrainOutcome, DrainReport, MutationOutcome,
    SyncCoordinator, SyncStatus,
};
pub use error::{DeliveryError, RemoteError, Result, StorageError, SyncError};
pub use notify::{
    DirectPlatform, NotificationDelivery, NotificationPlatform, Notifier, WorkerChannel,
    WorkerMessage,
};
pub use queue::DurableQueue;
pub use reminders::{NotifiedCache, ReminderScheduler, ReminderStore, SchedulerConfig, TickReport};
pub use remote::{HttpRemoteStore, RemoteReminders, RemoteTables, RowChange};
pub use service::{ServiceDeps, ServiceSettings, SyncService};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
