//! Error types for the Pensebête engine.

use crate::OperationId;
use thiserror::Error;

/// All possible errors from the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Model errors
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("operation not found: {0}")]
    OperationNotFound(OperationId),

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("duplicate operation in snapshot: {0}")]
    DuplicateOperation(OperationId),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
