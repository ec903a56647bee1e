//! Remote store seams.
//!
//! The coordinator and the reminder scheduler only talk to the remote store
//! through these traits. [`HttpRemoteStore`] is the production
//! implementation.

mod http;

pub use http::HttpRemoteStore;

use crate::error::RemoteError;
use async_trait::async_trait;
use pensebete_engine::protocol::{CreateRowResponse, ReminderQuery};
use pensebete_engine::{Reminder, Table};

/// Outcome of an update, delete or mark-sent on the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    /// The targeted row existed and was changed
    Applied,
    /// The targeted row does not exist (anymore)
    Missing,
}

impl RowChange {
    pub fn from_applied(applied: bool) -> Self {
        if applied {
            RowChange::Applied
        } else {
            RowChange::Missing
        }
    }
}

/// Row mutations on the remote store.
#[async_trait]
pub trait RemoteTables: Send + Sync {
    /// Insert a row. The store assigns its identity.
    ///
    /// Replaying the same `idempotency_key` returns the row created by the
    /// first call instead of inserting another one.
    async fn create(
        &self,
        table: Table,
        idempotency_key: &str,
        payload: &serde_json::Value,
    ) -> Result<CreateRowResponse, RemoteError>;

    /// Overwrite the given fields of an existing row.
    async fn update(
        &self,
        table: Table,
        record_id: &str,
        payload: &serde_json::Value,
    ) -> Result<RowChange, RemoteError>;

    /// Delete a row.
    async fn delete(&self, table: Table, record_id: &str) -> Result<RowChange, RemoteError>;
}

/// Reminder rows on the remote store.
#[async_trait]
pub trait RemoteReminders: Send + Sync {
    /// Reminders of the current owner matching the filters, earliest first.
    async fn query_reminders(&self, query: &ReminderQuery) -> Result<Vec<Reminder>, RemoteError>;

    /// Set the sent flag of a reminder. The flag never goes back to false.
    async fn mark_reminder_sent(&self, reminder_id: &str) -> Result<RowChange, RemoteError>;
}
