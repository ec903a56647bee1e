//! Error types for the sync client.

use crate::config::ConfigError;

/// Failure of the local durable storage.
///
/// Always fatal for the operation that hit it: the caller is told instead of
/// assuming the write went through.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt value under '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

/// Failure reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Network failure, timeout or server-side trouble; worth retrying later
    #[error("remote store unavailable: {0}")]
    Transient(String),

    /// The store refused the request; retrying the same request will not help
    #[error("remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RemoteError {
    /// Check whether a later retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }
}

/// Failure to show a notification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("notification permission denied")]
    PermissionDenied,

    #[error("notifications are not supported on this platform")]
    Unsupported,

    #[error("background worker is no longer running")]
    WorkerGone,

    #[error("platform error: {0}")]
    Platform(String),
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Engine error: {0}")]
    Engine(#[from] pensebete_engine::Error),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for the sync client.
pub type Result<T> = std::result::Result<T, SyncError>;
