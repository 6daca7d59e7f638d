//! Durable key-value storage and the task mirror built on it.
//!
//! The mirror is the client's offline fallback: every local change writes
//! the full collection under one key, and a fresh client starts from it
//! before the server answers.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::domain::Task;

/// Key under which the task collection is stored.
pub const TASKS_KEY: &str = "tasks";

// =============================================================================
// Errors
// =============================================================================

/// Failures of the underlying store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("Storage I/O failed for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    /// The value could not be encoded.
    #[error("Failed to encode value for key '{key}': {message}")]
    Encode { key: String, message: String },
}

// =============================================================================
// KeyValueStore
// =============================================================================

/// A string-to-string store that outlives the process.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so a crash mid-write leaves the previous value intact.
///
/// All I/O is blocking `std::fs`. Values are a few kilobytes of JSON, so
/// callers on the runtime (the board and the sync worker) write inline.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `directory`. The directory is created on
    /// the first write.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.json"))
    }
}

fn io_error(key: &str) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        key: key.to_string(),
        source,
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(io_error(key)(error)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.directory).map_err(io_error(key))?;

        let target = self.path_for(key);
        let temporary = self.directory.join(format!(".{key}.json.tmp"));
        fs::write(&temporary, value).map_err(io_error(key))?;
        fs::rename(&temporary, &target).map_err(io_error(key))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => Err(io_error(key)(error)),
            _ => Ok(()),
        }
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// =============================================================================
// TaskMirror
// =============================================================================

/// The persisted copy of the client's task collection.
#[derive(Clone)]
pub struct TaskMirror {
    store: Arc<dyn KeyValueStore>,
}

impl TaskMirror {
    /// Creates a mirror that keeps the collection under [`TASKS_KEY`] in
    /// `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Overwrites the stored collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when encoding or writing fails.
    pub fn save(&self, tasks: &[Task]) -> Result<(), StorageError> {
        let json = serde_json::to_string(tasks).map_err(|error| StorageError::Encode {
            key: TASKS_KEY.to_string(),
            message: error.to_string(),
        })?;
        self.store.set(TASKS_KEY, &json)
    }

    /// Returns the stored collection.
    ///
    /// Absent, unreadable or unparsable data yields an empty collection.
    pub fn load(&self) -> Vec<Task> {
        let raw = match self.store.get(TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                tracing::warn!(%error, "Failed to read task mirror");
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|error| {
            tracing::warn!(%error, "Discarding unparsable task mirror");
            Vec::new()
        })
    }

    /// Removes the stored collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the store cannot be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(TASKS_KEY)
    }
}

// =============================================================================
// Tests
// =============================================================================
