//! Preference storage backends
//!
//! A backend is a flat string key/value store. Backends that can observe
//! writes made by other execution contexts expose them through
//! [`PreferenceStorage::subscribe`]; writes from the current context are
//! never echoed back, which is why the watcher also polls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::StorageError;

/// A change notification for a single key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceChange {
    pub key: String,
    pub new_value: Option<String>,
}

/// Key/value storage for user preferences
pub trait PreferenceStorage: Send + Sync {
    /// Read a value, `None` when the key was never written
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Change notifications from other contexts, if the backend has them
    fn subscribe(&self) -> Option<broadcast::Receiver<PreferenceChange>> {
        None
    }
}

/// In-process storage with a cross-context notification channel
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<PreferenceChange>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Write a value as if another context (tab, process) had done it
    ///
    /// Unlike [`PreferenceStorage::set`], this fires a change notification.
    pub fn set_from_other_context(&self, key: &str, value: &str) {
        self.insert(key, value);
        let _ = self.changes.send(PreferenceChange {
            key: key.to_string(),
            new_value: Some(value.to_string()),
        });
    }

    fn insert(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.insert(key, value);
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<PreferenceChange>> {
        Some(self.changes.subscribe())
    }
}

/// JSON file storage, shared with other processes through the filesystem
///
/// There is no native notification here: edits made by other processes are
/// picked up by the watcher's poll.
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PreferenceStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        // A corrupt file is replaced rather than blocking every future write
        let mut values = self.read_all().unwrap_or_else(|e| {
            debug!(?e, path = ?self.path, "discarding unreadable preference file");
            HashMap::new()
        });
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&values)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
