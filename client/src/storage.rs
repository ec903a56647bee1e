//! Durable key-value storage for client state.
//!
//! Each value is a complete JSON document stored under a fixed key. Writes
//! replace the whole document, so a reader sees either the old value or the
//! new one.

use crate::error::StorageError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;

/// Local key-value storage.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Read the value under `key`, `None` when absent.
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value under `key`. Returns only once the value is durable.
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value under `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON value.
pub async fn load_json<T: DeserializeOwned>(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match storage.read(key).await? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Encode and write a JSON value.
pub async fn save_json<T: Serialize + ?Sized>(
    storage: &dyn KeyValueStorage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    storage.write(key, &raw).await
}

/// One JSON file per key inside a directory.
///
/// Writes go to a temporary file that is synced and then renamed over the
/// target.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) the storage directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::Io {
                key: dir.display().to_string(),
                source,
            })?;
        tracing::debug!("Opened file storage at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

/// Flush directory entries so a completed rename survives a crash.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

fn io_error(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key)(e)),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        let mut file = tokio::fs::File::create(&tmp).await.map_err(io_error(key))?;
        file.write_all(value.as_bytes())
            .await
            .map_err(io_error(key))?;
        file.sync_all().await.map_err(io_error(key))?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(io_error(key))?;
        sync_dir(&self.dir).await.map_err(io_error(key))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key)(e)),
        }
    }
}

/// In-memory storage.
///
/// Clones share the same values, so dropping every client object and
/// building new ones over a clone behaves like a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding the lock cannot leave a half-written value
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values().get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        assert_eq!(storage.read("queue").await.unwrap(), None);

        storage.write("queue", "[1,2]").await.unwrap();
        assert_eq!(storage.read("queue").await.unwrap().as_deref(), Some("[1,2]"));

        storage.write("queue", "[3]").await.unwrap();
        assert_eq!(storage.read("queue").await.unwrap().as_deref(), Some("[3]"));

        storage.remove("queue").await.unwrap();
        assert_eq!(storage.read("queue").await.unwrap(), None);

        // Removing twice is fine
        storage.remove("queue").await.unwrap();
    }

    #[tokio::test]
    async fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = FileStorage::open(dir.path()).await.unwrap();
            storage.write("pensebete-sync-storage", "{}").await.unwrap();
        }

        let storage = FileStorage::open(dir.path()).await.unwrap();
        assert_eq!(
            storage.read("pensebete-sync-storage").await.unwrap().as_deref(),
            Some("{}")
        );
    }

    #[tokio::test]
    async fn file_storage_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        storage.write("a", "1").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn directory_is_flushed_after_rename() {
        let dir = tempfile::tempdir().unwrap();
        sync_dir(dir.path()).await.unwrap();

        // A vanished directory surfaces as a write error, not a silent success
        let storage = FileStorage::open(dir.path().join("gone")).await.unwrap();
        std::fs::remove_dir(dir.path().join("gone")).unwrap();
        assert!(sync_dir(&storage.dir).await.is_err());
        assert!(matches!(
            storage.write("a", "1").await,
            Err(StorageError::Io { .. })
        ));
    }

    #[test]
    fn keys_are_sanitized() {
        let storage = FileStorage {
            dir: PathBuf::from("/data"),
        };
        assert_eq!(
            storage.path_for("../escape"),
            PathBuf::from("/data/___escape.json")
        );
    }

    #[tokio::test]
    async fn memory_storage_clones_share_values() {
        let storage = MemoryStorage::new();
        let other = storage.clone();

        storage.write("k", "v").await.unwrap();
        assert_eq!(other.read("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn json_helpers() {
        let storage = MemoryStorage::new();
        save_json(&storage, "k", &json!(["a", "b"])).await.unwrap();

        let value: Option<Vec<String>> = load_json(&storage, "k").await.unwrap();
        assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));

        storage.write("bad", "{not json").await.unwrap();
        let err = load_json::<Vec<String>>(&storage, "bad").await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
