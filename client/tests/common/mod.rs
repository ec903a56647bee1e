//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use pensebete_engine::protocol::{CreateRowResponse, ReminderQuery};
use pensebete_engine::{
    Notice, Permission, PlatformSupport, RecordId, Reminder, ReminderId, Table, Timestamp,
};
use pensebete_sync::{
    DeliveryError, KeyValueStorage, MemoryStorage, NotificationPlatform, RemoteError,
    RemoteReminders, RemoteTables, RowChange, StorageError,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const NOW: Timestamp = 1_706_745_600_000;
pub const MINUTE: u64 = 60_000;

// ============================================================================
// Remote store
// ============================================================================

#[derive(Default)]
struct RemoteState {
    rows: BTreeMap<(Table, RecordId), Value>,
    idempotency: HashMap<String, RecordId>,
    next_id: u64,
    /// Table calls in arrival order, successful or not
    calls: usize,
    /// Applied mutations, e.g. "create lists row-1"
    log: Vec<String>,
    failures: HashMap<usize, RemoteError>,
    lost_acks: Vec<usize>,
    reminders: BTreeMap<ReminderId, Reminder>,
    reminder_queries: usize,
    fail_reminder_queries: bool,
    fail_mark_sent: bool,
}

/// Remote store keeping rows and reminders in memory.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<RemoteState>,
    gate: Mutex<Option<Arc<Notify>>>,
    entered: Notify,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap()
    }

    /// Fail the `n`-th table call (0-based) with `error`.
    pub fn fail_call(&self, n: usize, error: RemoteError) {
        self.state().failures.insert(n, error);
    }

    /// Apply the `n`-th table call but report a transient failure.
    pub fn lose_ack(&self, n: usize) {
        self.state().lost_acks.push(n);
    }

    /// Hold the next table call until the returned handle is notified.
    pub fn hold_calls(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Wait until a table call reached the remote store.
    pub async fn call_entered(&self) {
        self.entered.notified().await;
    }

    pub fn log(&self) -> Vec<String> {
        self.state().log.clone()
    }

    pub fn calls(&self) -> usize {
        self.state().calls
    }

    pub fn row(&self, table: Table, id: &str) -> Option<Value> {
        self.state().rows.get(&(table, id.to_string())).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.state().rows.len()
    }

    pub fn insert_row(&self, table: Table, id: &str, data: Value) {
        self.state().rows.insert((table, id.to_string()), data);
    }

    pub fn add_reminder(&self, reminder: Reminder) {
        self.state().reminders.insert(reminder.id.clone(), reminder);
    }

    pub fn reminder(&self, id: &str) -> Option<Reminder> {
        self.state().reminders.get(id).cloned()
    }

    pub fn reminder_queries(&self) -> usize {
        self.state().reminder_queries
    }

    pub fn fail_reminder_queries(&self, fail: bool) {
        self.state().fail_reminder_queries = fail;
    }

    pub fn fail_mark_sent(&self, fail: bool) {
        self.state().fail_mark_sent = fail;
    }

    /// Count the call and decide its fate before it is applied.
    async fn begin_call(&self) -> Result<(usize, bool), RemoteError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.entered.notify_one();
            gate.notified().await;
        }

        let mut state = self.state();
        let n = state.calls;
        state.calls += 1;
        if let Some(error) = state.failures.remove(&n) {
            return Err(error);
        }
        let lose_ack = state.lost_acks.contains(&n);
        Ok((n, lose_ack))
    }
}

fn lost_ack() -> RemoteError {
    RemoteError::Transient("connection reset".to_string())
}

#[async_trait]
impl RemoteTables for FakeRemote {
    async fn create(
        &self,
        table: Table,
        idempotency_key: &str,
        payload: &Value,
    ) -> Result<CreateRowResponse, RemoteError> {
        let (_, lose_ack) = self.begin_call().await?;
        let mut state = self.state();

        if let Some(id) = state.idempotency.get(idempotency_key).cloned() {
            return Ok(CreateRowResponse { id, created: false });
        }

        state.next_id += 1;
        let id = format!("row-{}", state.next_id);
        state.rows.insert((table, id.clone()), payload.clone());
        state
            .idempotency
            .insert(idempotency_key.to_string(), id.clone());
        state.log.push(format!("create {} {}", table, id));

        if lose_ack {
            return Err(lost_ack());
        }
        Ok(CreateRowResponse { id, created: true })
    }

    async fn update(
        &self,
        table: Table,
        record_id: &str,
        payload: &Value,
    ) -> Result<RowChange, RemoteError> {
        let (_, lose_ack) = self.begin_call().await?;
        let mut state = self.state();

        let change = match state.rows.get_mut(&(table, record_id.to_string())) {
            Some(row) => {
                if let (Some(row), Some(patch)) = (row.as_object_mut(), payload.as_object()) {
                    for (field, value) in patch {
                        row.insert(field.clone(), value.clone());
                    }
                }
                RowChange::Applied
            }
            None => RowChange::Missing,
        };
        state.log.push(format!("update {} {}", table, record_id));

        if lose_ack {
            return Err(lost_ack());
        }
        Ok(change)
    }

    async fn delete(&self, table: Table, record_id: &str) -> Result<RowChange, RemoteError> {
        let (_, lose_ack) = self.begin_call().await?;
        let mut state = self.state();

        let change = match state.rows.remove(&(table, record_id.to_string())) {
            Some(_) => RowChange::Applied,
            None => RowChange::Missing,
        };
        state.log.push(format!("delete {} {}", table, record_id));

        if lose_ack {
            return Err(lost_ack());
        }
        Ok(change)
    }
}

#[async_trait]
impl RemoteReminders for FakeRemote {
    async fn query_reminders(&self, query: &ReminderQuery) -> Result<Vec<Reminder>, RemoteError> {
        let mut state = self.state();
        state.reminder_queries += 1;
        if state.fail_reminder_queries {
            return Err(RemoteError::Transient("reminders unavailable".to_string()));
        }

        let mut found: Vec<Reminder> = state
            .reminders
            .values()
            .filter(|reminder| query.matches(reminder))
            .cloned()
            .collect();
        found.sort_by_key(|reminder| reminder.due_time);
        Ok(found)
    }

    async fn mark_reminder_sent(&self, reminder_id: &str) -> Result<RowChange, RemoteError> {
        let mut state = self.state();
        if state.fail_mark_sent {
            return Err(RemoteError::Transient("mark sent failed".to_string()));
        }

        match state.reminders.get_mut(reminder_id) {
            Some(reminder) => {
                reminder.is_sent = true;
                Ok(RowChange::Applied)
            }
            None => Ok(RowChange::Missing),
        }
    }
}

pub fn reminder(id: &str, due_time: Timestamp) -> Reminder {
    Reminder {
        id: id.to_string(),
        item_id: format!("item-{}", id),
        list_id: "list-1".to_string(),
        due_time,
        is_sent: false,
        item_name: Some("Milk".to_string()),
        list_name: Some("Groceries".to_string()),
    }
}

// ============================================================================
// Notification platform
// ============================================================================

/// Platform recording shown notices.
pub struct FakePlatform {
    permission: Mutex<Permission>,
    fail_show: AtomicBool,
    shown: Mutex<Vec<Notice>>,
}

impl FakePlatform {
    pub fn granted() -> Arc<Self> {
        Arc::new(Self {
            permission: Mutex::new(Permission::Granted),
            fail_show: AtomicBool::new(false),
            shown: Mutex::new(Vec::new()),
        })
    }

    pub fn set_permission(&self, permission: Permission) {
        *self.permission.lock().unwrap() = permission;
    }

    pub fn fail_show(&self, fail: bool) {
        self.fail_show.store(fail, Ordering::SeqCst);
    }

    pub fn shown(&self) -> Vec<Notice> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationPlatform for FakePlatform {
    fn support(&self) -> PlatformSupport {
        PlatformSupport {
            supported: true,
            installed: true,
            install_required: false,
        }
    }

    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> Result<Permission, DeliveryError> {
        Ok(self.permission())
    }

    async fn show(&self, notice: &Notice) -> Result<(), DeliveryError> {
        if self.fail_show.load(Ordering::SeqCst) {
            return Err(DeliveryError::Platform("display failed".to_string()));
        }
        self.shown.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Memory storage whose writes can be made to fail.
#[derive(Clone, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }
}

#[async_trait]
impl KeyValueStorage for FlakyStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.write(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }
}
