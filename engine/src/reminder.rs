//! Reminders and the notifications they produce.

use crate::{RecordId, ReminderId, Timestamp};
use serde::{Deserialize, Serialize};

/// One minute in milliseconds.
pub const MINUTE_MS: u64 = 60_000;

/// Default look-ahead window for "due soon" reminders.
pub const DEFAULT_HORIZON_MS: u64 = 60 * MINUTE_MS;

/// Remaining time under which a reminder is announced as "due now".
pub const DUE_NOW_THRESHOLD_MS: u64 = MINUTE_MS;

const DEFAULT_ITEM_NAME: &str = "Item";
const DEFAULT_LIST_NAME: &str = "List";

/// A scheduled due time attached to a list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: ReminderId,
    pub item_id: RecordId,
    pub list_id: RecordId,
    /// Due time in milliseconds since epoch
    pub due_time: Timestamp,
    /// Server-side flag, set once and never cleared
    pub is_sent: bool,
    /// Content of the related list item
    #[serde(default)]
    pub item_name: Option<String>,
    /// Name of the list holding the item
    #[serde(default)]
    pub list_name: Option<String>,
}

/// Where a reminder stands relative to a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderPhase {
    /// Due beyond the horizon
    Pending,
    /// Due within the horizon
    DueSoon,
    /// Due time already passed without a notification
    Overdue,
    /// Already notified
    Sent,
}

impl Reminder {
    /// Classify the reminder at `now` with a look-ahead of `horizon_ms`.
    pub fn phase(&self, now: Timestamp, horizon_ms: u64) -> ReminderPhase {
        if self.is_sent {
            ReminderPhase::Sent
        } else if self.due_time < now {
            ReminderPhase::Overdue
        } else if self.due_time <= now.saturating_add(horizon_ms) {
            ReminderPhase::DueSoon
        } else {
            ReminderPhase::Pending
        }
    }

    fn item_name(&self) -> &str {
        self.item_name.as_deref().unwrap_or(DEFAULT_ITEM_NAME)
    }

    fn list_name(&self) -> &str {
        self.list_name.as_deref().unwrap_or(DEFAULT_LIST_NAME)
    }
}

/// Which announcement a notice carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NoticeKind {
    DueNow,
    DueIn { minutes: u64 },
    Overdue,
}

/// A user-visible notification built from a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub title: String,
    pub body: String,
    /// Platform tag, collapses repeated notifications for the same item
    pub tag: String,
    pub reminder_id: ReminderId,
    pub item_id: RecordId,
    pub kind: NoticeKind,
}

impl Notice {
    /// Build the "due now" / "due in N minutes" notice.
    pub fn due_soon(reminder: &Reminder, now: Timestamp) -> Self {
        let remaining = reminder.due_time.saturating_sub(now);
        let item = reminder.item_name();
        let list = reminder.list_name();

        let (kind, body) = if remaining <= DUE_NOW_THRESHOLD_MS {
            (
                NoticeKind::DueNow,
                format!("Item \"{}\" from list \"{}\" is due now!", item, list),
            )
        } else {
            let minutes = remaining.div_ceil(MINUTE_MS);
            (
                NoticeKind::DueIn { minutes },
                format!(
                    "Item \"{}\" from list \"{}\" is due in {} minutes",
                    item, list, minutes
                ),
            )
        };

        Self {
            title: format!("Reminder: {}", item),
            body,
            tag: reminder.item_id.clone(),
            reminder_id: reminder.id.clone(),
            item_id: reminder.item_id.clone(),
            kind,
        }
    }

    /// Build the overdue notice.
    pub fn overdue(reminder: &Reminder) -> Self {
        let item = reminder.item_name();
        let list = reminder.list_name();

        Self {
            title: format!("Overdue: {}", item),
            body: format!("Item \"{}\" from list \"{}\" is overdue!", item, list),
            tag: reminder.item_id.clone(),
            reminder_id: reminder.id.clone(),
            item_id: reminder.item_id.clone(),
            kind: NoticeKind::Overdue,
        }
    }
}
