//! Pending queue - the ordered set of operations awaiting confirmation.
//!
//! The queue holds every operation that has not yet been applied to the
//! remote store, in the order the user made them. Operations leave the queue
//! only when the remote store confirms them or when the user discards them.

use crate::{
    error::Result, generate_op_id, snapshot::QueueSnapshot, Change, Error, Operation,
    OperationId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// A permanent failure attached to a pending operation.
///
/// A rejected operation stays in the queue until the user discards it or
/// asks for another attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    /// Reason reported by the remote store
    pub reason: String,
    /// Status code of the rejecting response, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// When the rejection was recorded (milliseconds since epoch)
    pub rejected_at: Timestamp,
}

impl Rejection {
    pub fn new(reason: impl Into<String>, status: Option<u16>, rejected_at: Timestamp) -> Self {
        Self {
            reason: reason.into(),
            status,
            rejected_at,
        }
    }
}

/// FIFO queue of pending operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingQueue {
    /// Operations in replay order
    ops: VecDeque<Operation>,
    /// Permanent failures keyed by operation ID
    rejections: BTreeMap<OperationId, Rejection>,
    /// Last time the queue was fully drained
    last_sync_at: Option<Timestamp>,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identity for a change and append it to the tail.
    pub fn enqueue(&mut self, change: Change, now: Timestamp) -> Operation {
        let mut op_id = generate_op_id(now);
        while self.contains(&op_id) {
            op_id = generate_op_id(now);
        }

        let op = change.into_operation(op_id, now);
        self.ops.push_back(op.clone());
        op
    }

    /// Remove an operation. Returns false if it was not queued.
    pub fn remove(&mut self, op_id: &str) -> bool {
        let Some(index) = self.ops.iter().position(|op| op.op_id() == op_id) else {
            return false;
        };
        self.ops.remove(index);
        self.rejections.remove(op_id);
        true
    }

    /// Remove every pending operation.
    pub fn clear(&mut self) {
        self.ops.clear();
        self.rejections.clear();
    }

    /// Number of pending operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The next operation to replay.
    pub fn head(&self) -> Option<&Operation> {
        self.ops.front()
    }

    /// Get a pending operation by ID.
    pub fn get(&self, op_id: &str) -> Option<&Operation> {
        self.ops.iter().find(|op| op.op_id() == op_id)
    }

    /// Check if an operation is pending.
    pub fn contains(&self, op_id: &str) -> bool {
        self.get(op_id).is_some()
    }

    /// Iterate over pending operations in replay order.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter()
    }

    /// Attach a permanent failure to a pending operation.
    pub fn mark_rejected(&mut self, op_id: &str, rejection: Rejection) -> Result<()> {
        if !self.contains(op_id) {
            return Err(Error::OperationNotFound(op_id.to_string()));
        }
        self.rejections.insert(op_id.to_string(), rejection);
        Ok(())
    }

    /// Get the rejection attached to an operation.
    pub fn rejection(&self, op_id: &str) -> Option<&Rejection> {
        self.rejections.get(op_id)
    }

    /// Forget a rejection so the operation is replayed again.
    pub fn clear_rejection(&mut self, op_id: &str) -> bool {
        self.rejections.remove(op_id).is_some()
    }

    /// Iterate over rejected operations.
    pub fn rejections(&self) -> impl Iterator<Item = (&OperationId, &Rejection)> {
        self.rejections.iter()
    }

    /// Last time the queue was fully drained.
    pub fn last_sync_at(&self) -> Option<Timestamp> {
        self.last_sync_at
    }

    /// Record a successful full drain.
    pub fn mark_synced(&mut self, at: Timestamp) {
        self.last_sync_at = Some(at);
    }

    /// Export the queue as a snapshot.
    pub fn export_state(&self) -> QueueSnapshot {
        let mut snapshot = QueueSnapshot::new();
        snapshot.pending_ops = self.ops.iter().cloned().collect();
        snapshot.rejections = self.rejections.clone();
        snapshot.last_sync_at = self.last_sync_at;
        snapshot
    }

    /// Rebuild a queue from a snapshot.
    pub fn from_snapshot(snapshot: QueueSnapshot) -> Result<Self> {
        snapshot.validate()?;

        Ok(Self {
            ops: snapshot.pending_ops.into(),
            rejections: snapshot.rejections,
            last_sync_at: snapshot.last_sync_at,
        })
    }
}
