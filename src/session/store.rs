//! Snapshot persistence.
//!
//! Persistence is an optimization for the chat session, never a correctness
//! requirement: [`SnapshotStore::load`] degrades to the empty snapshot and
//! [`SnapshotStore::save`] swallows failures after logging them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use super::message::SessionSnapshot;
use crate::config::StorageConfig;

/// Errors raised inside a store. They never cross the [`SnapshotStore`] boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The stored document is not a session snapshot.
    #[error("stored snapshot is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value persistence for a single session snapshot.
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Read the stored snapshot. Absent or unreadable data yields the empty snapshot.
    fn load(&self) -> SessionSnapshot;

    /// Write the snapshot. Failures are logged and dropped.
    fn save(&self, snapshot: &SessionSnapshot);
}

/// Parse a stored document.
pub fn decode_snapshot(raw: &str) -> Result<SessionSnapshot, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

/// Serialize a snapshot to its stored form.
pub fn encode_snapshot(snapshot: &SessionSnapshot) -> Result<String, StoreError> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Build the store described by the storage configuration.
pub fn open_store(config: &StorageConfig) -> Arc<dyn SnapshotStore> {
    if config.enabled {
        Arc::new(FileStore::new(&config.dir, &config.key))
    } else {
        tracing::info!(name: "storage.unavailable", "Persistence disabled, running in-memory only");
        Arc::new(UnavailableStore)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File-backed store
// ─────────────────────────────────────────────────────────────────────────────

/// Stores the snapshot as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store for `key` under `dir`. Nothing is touched until the first save.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    /// Location of the stored document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        decode_snapshot(&raw).map(Some)
    }

    fn try_save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let json = encode_snapshot(snapshot)?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        // Write-then-rename so a crash never leaves a half-written document.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        if let Err(source) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(source));
        }
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> SessionSnapshot {
        match self.try_load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => SessionSnapshot::default(),
            Err(e) => {
                tracing::warn!(
                    name: "storage.load.failed",
                    path = %self.path.display(),
                    error = %e,
                    "Discarding unreadable snapshot"
                );
                SessionSnapshot::default()
            }
        }
    }

    fn save(&self, snapshot: &SessionSnapshot) {
        if let Err(e) = self.try_save(snapshot) {
            tracing::warn!(
                name: "storage.save.failed",
                path = %self.path.display(),
                error = %e,
                "Snapshot not persisted"
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps the raw stored document in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    raw: RwLock<Option<String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a raw document, valid or not.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: RwLock::new(Some(raw.into())),
        }
    }

    /// The raw document last written, if any.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.raw.read().ok().and_then(|guard| guard.clone())
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> SessionSnapshot {
        let Some(raw) = self.raw() else {
            return SessionSnapshot::default();
        };
        decode_snapshot(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unreadable snapshot");
            SessionSnapshot::default()
        })
    }

    fn save(&self, snapshot: &SessionSnapshot) {
        match encode_snapshot(snapshot) {
            Ok(json) => {
                if let Ok(mut guard) = self.raw.write() {
                    *guard = Some(json);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Snapshot not persisted"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// No storage
// ─────────────────────────────────────────────────────────────────────────────

/// Stand-in for contexts without persistent storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl SnapshotStore for UnavailableStore {
    fn load(&self) -> SessionSnapshot {
        SessionSnapshot::default()
    }

    fn save(&self, _snapshot: &SessionSnapshot) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::message::{Role, UiMessage};

    fn sample() -> SessionSnapshot {
        let mut snapshot = SessionSnapshot {
            messages: vec![
                UiMessage::new("u1", Role::User, "Is niacinamide safe daily?"),
                UiMessage::new("a1", Role::Assistant, "Yes, for most skin types."),
            ],
            ..SessionSnapshot::default()
        };
        snapshot.durations.insert("a1".to_string(), 1_250);
        snapshot
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), "chat-messages");

        store.save(&sample());
        assert!(store.path().exists());
        assert_eq!(store.load(), sample());
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"), "chat-messages");
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_file_store_corrupt_document_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), "chat-messages");

        fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_empty());

        fs::write(store.path(), r#"{"messages": 42}"#).unwrap();
        assert!(store.load().is_empty());

        fs::write(store.path(), "[]").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_file_store_save_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be makes create_dir_all fail.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let store = FileStore::new(blocker.join("sub"), "chat-messages");

        store.save(&sample());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), "chat-messages");
        // A non-empty directory at the target path cannot be replaced by a file.
        fs::create_dir_all(store.path().join("occupied")).unwrap();

        assert!(store.try_save(&sample()).is_err());
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), "chat-messages");

        store.save(&sample());
        store.save(&SessionSnapshot::default());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_memory_store_round_trip_and_corruption() {
        let store = MemoryStore::new();
        assert!(store.load().is_empty());
        store.save(&sample());
        assert_eq!(store.load(), sample());

        let corrupt = MemoryStore::with_raw("null");
        assert!(corrupt.load().is_empty());
    }

    #[test]
    fn test_unavailable_store_is_inert() {
        let store = UnavailableStore;
        store.save(&sample());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_open_store_respects_enabled_flag() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            enabled: false,
            dir: dir.path().display().to_string(),
            key: "chat-messages".to_string(),
        };
        let store = open_store(&config);
        store.save(&sample());
        assert!(store.load().is_empty());

        let store = open_store(&StorageConfig {
            enabled: true,
            ..config
        });
        store.save(&sample());
        assert_eq!(store.load(), sample());
    }
}
