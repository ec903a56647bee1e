//! Snapshot types for persisting and restoring the pending queue.
//!
//! Snapshots are the bridge between the in-memory queue and durable storage.
//! The whole queue is written as one value on every mutation and parsed back
//! on startup.

use crate::{error::Result, Error, Operation, OperationId, Rejection, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time snapshot of the pending queue.
///
/// Uses BTreeMap instead of HashMap for deterministic serialization order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Pending operations in replay order
    pub pending_ops: Vec<Operation>,
    /// Permanent failures attached to pending operations
    #[serde(default)]
    pub rejections: BTreeMap<OperationId, Rejection>,
    /// Last time the queue was fully drained
    #[serde(default)]
    pub last_sync_at: Option<Timestamp>,
}

impl QueueSnapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            pending_ops: Vec::new(),
            rejections: BTreeMap::new(),
            last_sync_at: None,
        }
    }

    /// Count pending operations.
    pub fn pending_count(&self) -> usize {
        self.pending_ops.len()
    }

    /// Check the snapshot is internally consistent.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.pending_ops.len());
        for op in &self.pending_ops {
            if !seen.insert(op.op_id().as_str()) {
                return Err(Error::DuplicateOperation(op.op_id().clone()));
            }
        }

        for op_id in self.rejections.keys() {
            if !seen.contains(op_id.as_str()) {
                return Err(Error::InvalidSnapshot(format!(
                    "rejection recorded for unknown operation '{}'",
                    op_id
                )));
            }
        }

        Ok(())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl Default for QueueSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
