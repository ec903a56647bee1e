//! Sync coordinator.
//!
//! Drains the pending queue against the remote store, strictly in FIFO
//! order and one operation at a time. An operation leaves the queue only
//! after the remote store confirmed it, so an interrupted drain never loses
//! or reorders work.
//!
//! ## Failure handling
//!
//! - A transient failure stops the pass and leaves the head in place; the
//!   next pass replays it
//! - A permanent rejection is attached to the head and blocks the queue
//!   until the user discards or retries that operation
//! - Update or delete of a row that no longer exists counts as applied

use crate::clock::Clock;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{RemoteError, Result};
use crate::queue::DurableQueue;
use crate::remote::{RemoteTables, RowChange};
use crate::shutdown::ShutdownSignal;
use pensebete_engine::{
    Change, OpKind, Operation, OperationId, RecordId, Rejection, Table, Timestamp,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// The operation currently blocking the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedOperation {
    pub op_id: OperationId,
    pub table: Table,
    pub kind: OpKind,
    pub rejection: Rejection,
}

/// Sync state exposed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub pending_count: usize,
    pub last_sync_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<BlockedOperation>,
    /// Last transient failure, cleared by the next completed drain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// An operation confirmed by the remote store during a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedOperation {
    pub op_id: OperationId,
    pub table: Table,
    pub kind: OpKind,
    /// Identity of the affected row; assigned by the store for creates
    pub record_id: Option<RecordId>,
    /// The store had already applied it (replayed create or missing row)
    pub already_applied: bool,
}

/// Why a drain pass stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue is empty
    Completed,
    /// The device is offline
    Offline,
    /// Another pass is running; this call did nothing
    AlreadyRunning,
    /// A transient failure; the operation stays at the head
    Interrupted {
        op_id: OperationId,
        error: RemoteError,
    },
    /// The head carries a permanent rejection
    Blocked {
        op_id: OperationId,
        rejection: Rejection,
    },
}

/// Result of one drain pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub applied: Vec<AppliedOperation>,
    pub outcome: DrainOutcome,
}

impl DrainReport {
    fn new(outcome: DrainOutcome) -> Self {
        Self {
            applied: Vec::new(),
            outcome,
        }
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == DrainOutcome::Completed
    }

    fn find(&self, op_id: &str) -> Option<&AppliedOperation> {
        self.applied.iter().find(|applied| applied.op_id == op_id)
    }
}

/// What happened to a user change.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Confirmed by the remote store before returning
    Synced {
        op: Operation,
        record_id: Option<RecordId>,
    },
    /// Durably queued; a later drain will apply it
    Queued { op: Operation },
}

impl MutationOutcome {
    pub fn op(&self) -> &Operation {
        match self {
            MutationOutcome::Synced { op, .. } | MutationOutcome::Queued { op } => op,
        }
    }
}

/// Clears the syncing flag when a drain pass ends, however it ends.
struct SyncingGuard<'a> {
    coordinator: &'a SyncCoordinator,
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.syncing.store(false, Ordering::Release);
        self.coordinator.status.send_modify(|s| s.is_syncing = false);
    }
}

/// Drives the pending queue to the remote store.
pub struct SyncCoordinator {
    queue: Mutex<DurableQueue>,
    remote: Arc<dyn RemoteTables>,
    connectivity: ConnectivityMonitor,
    clock: Arc<dyn Clock>,
    syncing: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

impl SyncCoordinator {
    pub fn new(
        queue: DurableQueue,
        remote: Arc<dyn RemoteTables>,
        connectivity: ConnectivityMonitor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (status, _rx) = watch::channel(SyncStatus {
            is_online: connectivity.is_online(),
            is_syncing: false,
            pending_count: queue.count(),
            last_sync_at: queue.last_sync_at(),
            blocked: blocked_operation(&queue),
            last_error: None,
        });

        Self {
            queue: Mutex::new(queue),
            remote,
            connectivity,
            clock,
            syncing: AtomicBool::new(false),
            status,
        }
    }

    /// Current sync state.
    pub fn status(&self) -> SyncStatus {
        let mut status = self.status.borrow().clone();
        status.is_online = self.connectivity.is_online();
        status.is_syncing = self.syncing.load(Ordering::Acquire);
        status
    }

    /// Subscribe to sync state changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.count()
    }

    /// Pending operations in replay order.
    pub async fn pending_operations(&self) -> Vec<Operation> {
        self.queue.lock().await.queue().iter().cloned().collect()
    }

    fn refresh_status(&self, queue: &DurableQueue) {
        let blocked = blocked_operation(queue);
        let online = self.connectivity.is_online();

        self.status.send_modify(|s| {
            s.is_online = online;
            s.pending_count = queue.count();
            s.last_sync_at = queue.last_sync_at();
            s.blocked = blocked;
        });
    }

    /// Apply a user change.
    ///
    /// The change is always queued durably first. When online, a drain pass
    /// follows so the change reaches the remote store behind anything queued
    /// earlier.
    pub async fn mutate(&self, change: Change) -> Result<MutationOutcome> {
        let op = {
            let mut queue = self.queue.lock().await;
            let op = queue.enqueue(change, self.clock.now()).await?;
            self.refresh_status(&queue);
            op
        };
        tracing::debug!(
            op_id = %op.op_id(),
            table = %op.table(),
            kind = ?op.kind(),
            "Queued operation"
        );

        if !self.connectivity.is_online() {
            return Ok(MutationOutcome::Queued { op });
        }

        let report = self.drain().await?;
        match report.find(op.op_id()) {
            Some(applied) => Ok(MutationOutcome::Synced {
                record_id: applied.record_id.clone(),
                op,
            }),
            None => Ok(MutationOutcome::Queued { op }),
        }
    }

    /// Replay pending operations until the queue is empty or a pass stops.
    ///
    /// At most one pass runs at a time; a concurrent call returns
    /// [`DrainOutcome::AlreadyRunning`] without touching the queue.
    pub async fn drain(&self) -> Result<DrainReport> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Drain already in progress");
            return Ok(DrainReport::new(DrainOutcome::AlreadyRunning));
        }
        let _guard = SyncingGuard { coordinator: self };
        self.status.send_modify(|s| s.is_syncing = true);

        let mut applied = Vec::new();
        let outcome = loop {
            if !self.connectivity.is_online() {
                break DrainOutcome::Offline;
            }

            let head = {
                let mut queue = self.queue.lock().await;
                let Some(head) = queue.head().cloned() else {
                    queue.mark_synced(self.clock.now()).await?;
                    self.refresh_status(&queue);
                    break DrainOutcome::Completed;
                };
                if let Some(rejection) = queue.rejection(head.op_id()) {
                    break DrainOutcome::Blocked {
                        op_id: head.op_id().clone(),
                        rejection: rejection.clone(),
                    };
                }
                head
            };

            match self.apply(&head).await {
                Ok(result) => {
                    let mut queue = self.queue.lock().await;
                    queue.remove(head.op_id()).await?;
                    self.refresh_status(&queue);
                    applied.push(result);
                }
                Err(RemoteError::Rejected { status, message }) => {
                    tracing::warn!(
                        op_id = %head.op_id(),
                        status,
                        "Remote store rejected operation: {}",
                        message
                    );
                    let rejection = Rejection::new(message, Some(status), self.clock.now());
                    let mut queue = self.queue.lock().await;
                    if queue.contains(head.op_id()) {
                        queue
                            .mark_rejected(head.op_id(), rejection.clone())
                            .await?;
                    }
                    self.refresh_status(&queue);
                    break DrainOutcome::Blocked {
                        op_id: head.op_id().clone(),
                        rejection,
                    };
                }
                Err(error) => {
                    tracing::warn!(op_id = %head.op_id(), "Drain interrupted: {}", error);
                    break DrainOutcome::Interrupted {
                        op_id: head.op_id().clone(),
                        error,
                    };
                }
            }
        };

        self.status.send_modify(|s| match &outcome {
            DrainOutcome::Completed => s.last_error = None,
            DrainOutcome::Interrupted { error, .. } => s.last_error = Some(error.to_string()),
            _ => {}
        });
        tracing::info!(
            applied = applied.len(),
            outcome = ?outcome,
            "Drain pass finished"
        );

        Ok(DrainReport { applied, outcome })
    }

    async fn apply(&self, op: &Operation) -> std::result::Result<AppliedOperation, RemoteError> {
        let (record_id, already_applied) = match op {
            Operation::Create(create) => {
                let response = self
                    .remote
                    .create(create.table, &create.op_id, &create.payload)
                    .await?;
                if !response.created {
                    tracing::debug!(op_id = %create.op_id, "Create was already applied");
                }
                (Some(response.id), !response.created)
            }
            Operation::Update(update) => {
                let change = self
                    .remote
                    .update(update.table, &update.record_id, &update.payload)
                    .await?;
                (Some(update.record_id.clone()), missing(op, change))
            }
            Operation::Delete(delete) => {
                let change = self.remote.delete(delete.table, &delete.record_id).await?;
                (Some(delete.record_id.clone()), missing(op, change))
            }
        };

        Ok(AppliedOperation {
            op_id: op.op_id().clone(),
            table: op.table(),
            kind: op.kind(),
            record_id,
            already_applied,
        })
    }

    /// Drop a pending operation without applying it.
    pub async fn discard(&self, op_id: &str) -> Result<bool> {
        let mut queue = self.queue.lock().await;
        let removed = queue.remove(op_id).await?;
        if removed {
            tracing::info!(op_id, "Discarded pending operation");
        }
        self.refresh_status(&queue);
        Ok(removed)
    }

    /// Clear the rejection of an operation and drain again.
    pub async fn retry(&self, op_id: &str) -> Result<DrainReport> {
        {
            let mut queue = self.queue.lock().await;
            if queue.clear_rejection(op_id).await? {
                tracing::info!(op_id, "Retrying rejected operation");
            }
            self.refresh_status(&queue);
        }
        self.drain().await
    }

    /// Drop every pending operation.
    pub async fn clear(&self) -> Result<()> {
        let mut queue = self.queue.lock().await;
        let dropped = queue.count();
        queue.clear().await?;
        self.refresh_status(&queue);
        tracing::info!(dropped, "Cleared pending queue");
        Ok(())
    }

    /// Drain whenever connectivity comes back.
    pub fn spawn_reconnect_listener(self: &Arc<Self>, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        let mut states = self.connectivity.subscribe();

        tokio::spawn(async move {
            let mut reconnects = states.borrow_and_update().reconnects;

            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *states.borrow_and_update();
                        coordinator.status.send_modify(|s| s.is_online = state.online);

                        if state.online && state.reconnects != reconnects {
                            reconnects = state.reconnects;
                            if let Err(e) = coordinator.drain().await {
                                tracing::error!("Drain after reconnect failed: {}", e);
                            }
                        }
                    }
                }
            }
            tracing::debug!("Reconnect listener stopped");
        })
    }

    /// Drain periodically so interrupted passes are retried while online.
    pub fn spawn_retry_timer(
        self: &Arc<Self>,
        period: Duration,
        mut shutdown: ShutdownSignal,
    ) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticks = tokio::time::interval_at(start, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticks.tick() => {
                        if !coordinator.connectivity.is_online() {
                            continue;
                        }
                        if coordinator.pending_count().await == 0 {
                            continue;
                        }
                        if let Err(e) = coordinator.drain().await {
                            tracing::error!("Periodic drain failed: {}", e);
                        }
                    }
                }
            }
            tracing::debug!("Retry timer stopped");
        })
    }
}

/// The head operation, if it carries a rejection.
fn blocked_operation(queue: &DurableQueue) -> Option<BlockedOperation> {
    let op = queue.head()?;
    queue.rejection(op.op_id()).map(|rejection| BlockedOperation {
        op_id: op.op_id().clone(),
        table: op.table(),
        kind: op.kind(),
        rejection: rejection.clone(),
    })
}

fn missing(op: &Operation, change: RowChange) -> bool {
    if change == RowChange::Missing {
        tracing::debug!(
            op_id = %op.op_id(),
            kind = ?op.kind(),
            "Target row is gone, treating operation as applied"
        );
        true
    } else {
        false
    }
}
