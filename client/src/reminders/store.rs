//! Reminder queries and the local record of announced reminders.

use crate::error::{RemoteError, Result};
use crate::remote::{RemoteReminders, RowChange};
use crate::storage::{load_json, save_json, KeyValueStorage};
use pensebete_engine::protocol::ReminderQuery;
use pensebete_engine::{DedupeCache, DedupeKey, DedupePolicy, Reminder, Timestamp};
use std::sync::Arc;

/// Storage key of the notified-reminder cache.
pub const NOTIFIED_KEY: &str = "pensebete-notified-reminders";

/// Reminder rows of the current owner, as held by the remote store.
#[derive(Clone)]
pub struct ReminderStore {
    remote: Arc<dyn RemoteReminders>,
}

impl ReminderStore {
    pub fn new(remote: Arc<dyn RemoteReminders>) -> Self {
        Self { remote }
    }

    /// Unsent reminders due in `[now, now + horizon_ms]`, earliest first.
    pub async fn due_soon(
        &self,
        now: Timestamp,
        horizon_ms: u64,
    ) -> std::result::Result<Vec<Reminder>, RemoteError> {
        self.query(ReminderQuery::due_within(now, horizon_ms)).await
    }

    /// Unsent reminders due before `now`, earliest first.
    pub async fn overdue(&self, now: Timestamp) -> std::result::Result<Vec<Reminder>, RemoteError> {
        self.query(ReminderQuery::overdue(now)).await
    }

    async fn query(&self, query: ReminderQuery) -> std::result::Result<Vec<Reminder>, RemoteError> {
        let mut reminders = self.remote.query_reminders(&query).await?;
        // The store already filters; this keeps the windows exact whatever it returns
        reminders.retain(|reminder| query.matches(reminder));
        reminders.sort_by_key(|reminder| reminder.due_time);
        Ok(reminders)
    }

    /// Flag a reminder as sent.
    pub async fn mark_sent(&self, reminder_id: &str) -> std::result::Result<RowChange, RemoteError> {
        self.remote.mark_reminder_sent(reminder_id).await
    }
}

/// Reminders already announced on this device, persisted across restarts.
pub struct NotifiedCache {
    cache: DedupeCache,
    storage: Arc<dyn KeyValueStorage>,
}

impl NotifiedCache {
    /// Load the cache. An unreadable cache is replaced by an empty one.
    pub async fn load(storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        let cache = match load_json::<DedupeCache>(storage.as_ref(), NOTIFIED_KEY).await {
            Ok(cache) => cache.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Discarding unreadable notified-reminder cache: {}", e);
                DedupeCache::new()
            }
        };
        Ok(Self { cache, storage })
    }

    pub fn contains(&self, key: &DedupeKey) -> bool {
        self.cache.contains(key)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Record a key. Returns false if it was already present.
    ///
    /// The key is kept in memory even when saving fails, so this session
    /// never announces it again; the error only reports the lost write.
    pub async fn record(&mut self, key: &DedupeKey) -> Result<bool> {
        if !self.cache.insert(key) {
            return Ok(false);
        }
        save_json(self.storage.as_ref(), NOTIFIED_KEY, &self.cache).await?;
        Ok(true)
    }

    /// Apply the size bound. Returns the number of dropped keys.
    pub async fn compact(&mut self, policy: DedupePolicy) -> Result<usize> {
        let mut next = self.cache.clone();
        let dropped = next.compact(policy);
        if dropped > 0 {
            save_json(self.storage.as_ref(), NOTIFIED_KEY, &next).await?;
            self.cache = next;
        }
        Ok(dropped)
    }
}
