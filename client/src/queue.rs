//! Durable pending queue.
//!
//! Wraps the engine's [`PendingQueue`] so that every mutation is written to
//! storage before it becomes visible. A mutation is computed on a copy,
//! the copy is persisted, and only then does it replace the in-memory queue.
//! A failed write leaves the queue exactly as it was.

use crate::error::Result;
use crate::storage::KeyValueStorage;
use pensebete_engine::{Change, Operation, PendingQueue, QueueSnapshot, Rejection, Timestamp};
use std::sync::Arc;

/// Storage key of the queue snapshot.
pub const QUEUE_KEY: &str = "pensebete-sync-storage";

/// Pending queue persisted after every change.
pub struct DurableQueue {
    queue: PendingQueue,
    storage: Arc<dyn KeyValueStorage>,
}

impl DurableQueue {
    /// Restore the queue from storage, empty if nothing was saved yet.
    pub async fn load(storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        let queue = match storage.read(QUEUE_KEY).await? {
            Some(json) => PendingQueue::from_snapshot(QueueSnapshot::from_json(&json)?)?,
            None => PendingQueue::new(),
        };

        if !queue.is_empty() {
            tracing::info!(pending = queue.len(), "Restored pending operations");
        }

        Ok(Self { queue, storage })
    }

    /// Read-only view of the in-memory queue.
    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn count(&self) -> usize {
        self.queue.len()
    }

    pub fn head(&self) -> Option<&Operation> {
        self.queue.head()
    }

    pub fn contains(&self, op_id: &str) -> bool {
        self.queue.contains(op_id)
    }

    pub fn rejection(&self, op_id: &str) -> Option<&Rejection> {
        self.queue.rejection(op_id)
    }

    pub fn last_sync_at(&self) -> Option<Timestamp> {
        self.queue.last_sync_at()
    }

    async fn commit(&mut self, next: PendingQueue) -> Result<()> {
        let json = next.export_state().to_json()?;
        self.storage
            .write(QUEUE_KEY, &json)
            .await
            .inspect_err(|e| tracing::error!("Failed to persist pending queue: {}", e))?;
        self.queue = next;
        Ok(())
    }

    /// Append a change. Returns once the new operation is durable.
    pub async fn enqueue(&mut self, change: Change, now: Timestamp) -> Result<Operation> {
        let mut next = self.queue.clone();
        let op = next.enqueue(change, now);
        self.commit(next).await?;
        Ok(op)
    }

    /// Remove an operation. Returns false, without writing, if it is absent.
    pub async fn remove(&mut self, op_id: &str) -> Result<bool> {
        if !self.queue.contains(op_id) {
            return Ok(false);
        }
        let mut next = self.queue.clone();
        next.remove(op_id);
        self.commit(next).await?;
        Ok(true)
    }

    /// Drop every pending operation.
    pub async fn clear(&mut self) -> Result<()> {
        let mut next = self.queue.clone();
        next.clear();
        self.commit(next).await
    }

    /// Attach a permanent failure to an operation.
    pub async fn mark_rejected(&mut self, op_id: &str, rejection: Rejection) -> Result<()> {
        let mut next = self.queue.clone();
        next.mark_rejected(op_id, rejection)?;
        self.commit(next).await
    }

    /// Detach the failure of an operation. Returns false if it had none.
    pub async fn clear_rejection(&mut self, op_id: &str) -> Result<bool> {
        if self.queue.rejection(op_id).is_none() {
            return Ok(false);
        }
        let mut next = self.queue.clone();
        next.clear_rejection(op_id);
        self.commit(next).await?;
        Ok(true)
    }

    /// Record a completed drain.
    pub async fn mark_synced(&mut self, at: Timestamp) -> Result<()> {
        let mut next = self.queue.clone();
        next.mark_synced(at);
        self.commit(next).await
    }
}
