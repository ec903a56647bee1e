//! Wire protocol between the sync client and the remote store service.
//!
//! All bodies are JSON with camelCase field names. Timestamps are
//! milliseconds since the Unix epoch.

use crate::{RecordId, Reminder, Table, Timestamp};
use serde::{Deserialize, Serialize};

/// Body of `POST /tables/{table}/rows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRowRequest {
    /// Client-generated key; replaying it never creates a second row
    pub idempotency_key: String,
    pub data: serde_json::Value,
}

/// Response to a create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRowResponse {
    /// Identity assigned by the store
    pub id: RecordId,
    /// False when the idempotency key had already been used
    pub created: bool,
}

/// Body of `PATCH /tables/{table}/rows/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRowRequest {
    /// Fields to overwrite
    pub data: serde_json::Value,
}

/// Response to an update, delete or mark-sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    /// False when the targeted row does not exist
    pub applied: bool,
}

/// A stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowResponse {
    pub id: RecordId,
    pub table: Table,
    pub data: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Body of `POST /reminders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReminderRequest {
    pub item_id: RecordId,
    pub list_id: RecordId,
    pub due_time: Timestamp,
}

/// Query string of `GET /reminders`.
///
/// `due_from`/`due_to` are inclusive bounds; `due_before` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderQuery {
    pub is_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_from: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_to: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_before: Option<Timestamp>,
}

impl ReminderQuery {
    /// Unsent reminders due in `[now, now + horizon_ms]`.
    pub fn due_within(now: Timestamp, horizon_ms: u64) -> Self {
        Self {
            is_sent: false,
            due_from: Some(now),
            due_to: Some(now.saturating_add(horizon_ms)),
            due_before: None,
        }
    }

    /// Unsent reminders due strictly before `now`.
    pub fn overdue(now: Timestamp) -> Self {
        Self {
            is_sent: false,
            due_from: None,
            due_to: None,
            due_before: Some(now),
        }
    }

    /// Check whether a reminder satisfies the filters.
    pub fn matches(&self, reminder: &Reminder) -> bool {
        reminder.is_sent == self.is_sent
            && self.due_from.map_or(true, |from| reminder.due_time >= from)
            && self.due_to.map_or(true, |to| reminder.due_time <= to)
            && self.due_before.map_or(true, |before| reminder.due_time < before)
    }
}

/// Error body returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
