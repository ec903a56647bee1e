//! # Pensebête Engine
//!
//! The deterministic core of the Pensebête offline sync client.
//!
//! This crate models everything the sync client must remember while the
//! device is offline: the queue of mutations not yet confirmed by the remote
//! store, the reminders attached to list items, and the set of reminders
//! already announced on this device.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of files, network, or timers
//! - **Deterministic**: time is always passed in, never read from a clock
//! - **Serializable**: every piece of state has a stable JSON snapshot form
//!
//! ## Core Concepts
//!
//! ### Operations
//!
//! A user change is described by a [`Change`] and frozen into an
//! [`Operation`] when it is queued:
//! - [`CreateOp`] - create a row; the remote store assigns its identity
//! - [`UpdateOp`] - overwrite fields of an existing row
//! - [`DeleteOp`] - remove an existing row
//!
//! ### Pending Queue
//!
//! The [`PendingQueue`] keeps operations in the order the user made them.
//! Operations leave it only once applied or explicitly discarded. Permanent
//! failures are attached to the operation as a [`Rejection`].
//!
//! ### Reminders
//!
//! A [`Reminder`] is classified into a [`ReminderPhase`] and turned into a
//! [`Notice`]. The [`DedupeCache`] records which notices were already shown.
//!
//! ## Quick Start
//!
//! ```rust
//! use pensebete_engine::{Change, PendingQueue, QueueSnapshot, Table};
//! use serde_json::json;
//!
//! let mut queue = PendingQueue::new();
//! let op = queue.enqueue(
//!     Change::create(Table::Lists, json!({"name": "Groceries"})),
//!     1706745600000,
//! );
//! assert_eq!(queue.head(), Some(&op));
//!
//! // Persist and restore
//! let json = queue.export_state().to_json().unwrap();
//! let restored = PendingQueue::from_snapshot(QueueSnapshot::from_json(&json).unwrap()).unwrap();
//! assert_eq!(restored.len(), 1);
//! ```

pub mod dedupe;
pub mod error;
pub mod notification;
pub mod operation;
pub mod protocol;
pub mod queue;
pub mod reminder;
pub mod snapshot;

// Re-export main types at crate root
pub use dedupe::{DedupeCache, DedupeKey, DedupePolicy};
pub use error::Error;
pub use notification::{
    notifications_enabled, NotificationPreference, NotificationStatus, Permission,
    PermissionRequest, PlatformSupport,
};
pub use operation::{
    generate_op_id, Change, CreateOp, DeleteOp, OpKind, Operation, Table, UpdateOp,
};
pub use queue::{PendingQueue, Rejection};
pub use reminder::{
    Notice, NoticeKind, Reminder, ReminderPhase, DEFAULT_HORIZON_MS, DUE_NOW_THRESHOLD_MS,
    MINUTE_MS,
};
pub use snapshot::{QueueSnapshot, SNAPSHOT_FORMAT_VERSION};

/// Type aliases for clarity
pub type OperationId = String;
pub type RecordId = String;
pub type ReminderId = String;
pub type Timestamp = u64;
