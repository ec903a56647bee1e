//! Operation records describing pending mutations.
//!
//! Every change the user makes is captured as an [`Operation`] before it
//! reaches the remote store. Operations are immutable once allocated: the
//! queue only ever appends them or removes them whole.

use crate::{error::Result, Error, OperationId, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical collection targeted by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Lists,
    ListItems,
    Folders,
    SharedLists,
}

impl Table {
    /// Every table the remote store knows about.
    pub const ALL: [Table; 4] = [
        Table::Lists,
        Table::ListItems,
        Table::Folders,
        Table::SharedLists,
    ];

    /// Wire name of the table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Lists => "lists",
            Table::ListItems => "list_items",
            Table::Folders => "folders",
            Table::SharedLists => "shared_lists",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Table::ALL
            .into_iter()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| Error::UnknownTable(s.to_string()))
    }
}

/// Kind of mutation an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Create => f.write_str("create"),
            OpKind::Update => f.write_str("update"),
            OpKind::Delete => f.write_str("delete"),
        }
    }
}

/// A create operation. The remote store assigns the row identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOp {
    /// Operation ID, doubles as the remote idempotency key
    pub op_id: OperationId,
    /// Target table
    pub table: Table,
    /// Row data
    pub payload: serde_json::Value,
    /// When the operation was recorded (milliseconds since epoch)
    pub timestamp: Timestamp,
}

/// An update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOp {
    /// Operation ID
    pub op_id: OperationId,
    /// Target table
    pub table: Table,
    /// Row to update
    pub record_id: RecordId,
    /// Fields touched by the update
    pub payload: serde_json::Value,
    /// When the operation was recorded (milliseconds since epoch)
    pub timestamp: Timestamp,
}

/// A delete operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOp {
    /// Operation ID
    pub op_id: OperationId,
    /// Target table
    pub table: Table,
    /// Row to delete
    pub record_id: RecordId,
    /// When the operation was recorded (milliseconds since epoch)
    pub timestamp: Timestamp,
}

/// A pending mutation against the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Create(CreateOp),
    Update(UpdateOp),
    Delete(DeleteOp),
}

impl Operation {
    /// Get the operation ID.
    pub fn op_id(&self) -> &OperationId {
        match self {
            Operation::Create(op) => &op.op_id,
            Operation::Update(op) => &op.op_id,
            Operation::Delete(op) => &op.op_id,
        }
    }

    /// Get the table this operation targets.
    pub fn table(&self) -> Table {
        match self {
            Operation::Create(op) => op.table,
            Operation::Update(op) => op.table,
            Operation::Delete(op) => op.table,
        }
    }

    /// Get the kind of mutation.
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::Create(_) => OpKind::Create,
            Operation::Update(_) => OpKind::Update,
            Operation::Delete(_) => OpKind::Delete,
        }
    }

    /// Get the targeted row, if the operation addresses an existing one.
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            Operation::Create(_) => None,
            Operation::Update(op) => Some(&op.record_id),
            Operation::Delete(op) => Some(&op.record_id),
        }
    }

    /// Get the payload, if the operation carries one.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Operation::Create(op) => Some(&op.payload),
            Operation::Update(op) => Some(&op.payload),
            Operation::Delete(_) => None,
        }
    }

    /// Get the timestamp of this operation.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Operation::Create(op) => op.timestamp,
            Operation::Update(op) => op.timestamp,
            Operation::Delete(op) => op.timestamp,
        }
    }
}

/// A mutation requested by the UI, before it is given an identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Create {
        table: Table,
        payload: serde_json::Value,
    },
    Update {
        table: Table,
        record_id: RecordId,
        payload: serde_json::Value,
    },
    Delete {
        table: Table,
        record_id: RecordId,
    },
}

impl Change {
    pub fn create(table: Table, payload: serde_json::Value) -> Self {
        Change::Create { table, payload }
    }

    pub fn update(table: Table, record_id: impl Into<RecordId>, payload: serde_json::Value) -> Self {
        Change::Update {
            table,
            record_id: record_id.into(),
            payload,
        }
    }

    pub fn delete(table: Table, record_id: impl Into<RecordId>) -> Self {
        Change::Delete {
            table,
            record_id: record_id.into(),
        }
    }

    /// Get the table this change targets.
    pub fn table(&self) -> Table {
        match self {
            Change::Create { table, .. } => *table,
            Change::Update { table, .. } => *table,
            Change::Delete { table, .. } => *table,
        }
    }

    /// Freeze the change into an operation record.
    pub fn into_operation(self, op_id: impl Into<OperationId>, timestamp: Timestamp) -> Operation {
        let op_id = op_id.into();
        match self {
            Change::Create { table, payload } => Operation::Create(CreateOp {
                op_id,
                table,
                payload,
                timestamp,
            }),
            Change::Update {
                table,
                record_id,
                payload,
            } => Operation::Update(UpdateOp {
                op_id,
                table,
                record_id,
                payload,
                timestamp,
            }),
            Change::Delete { table, record_id } => Operation::Delete(DeleteOp {
                op_id,
                table,
                record_id,
                timestamp,
            }),
        }
    }
}

/// Length of the random part of a generated operation ID.
const OP_ID_SUFFIX_LEN: usize = 9;

/// Generate an operation ID: the timestamp followed by a random suffix.
///
/// IDs sort roughly by creation time, and the suffix keeps IDs allocated
/// within the same millisecond distinct.
pub fn generate_op_id(timestamp: Timestamp) -> OperationId {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", timestamp, &suffix[..OP_ID_SUFFIX_LEN])
}
