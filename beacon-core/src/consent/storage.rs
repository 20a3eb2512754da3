//! Durable key-value storage for consent preferences
//!
//! In the browser this is `localStorage`; here it is a trait with an
//! in-memory backend and a file backend (one file per key).

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::error::{TrackingError, TrackingResult};

/// Key-value storage backend
pub trait ConsentStorage: Send + Sync {
    /// Read the raw value stored under `key`
    fn get(&self, key: &str) -> TrackingResult<Option<String>>;

    /// Overwrite the value stored under `key`
    fn set(&self, key: &str, value: &str) -> TrackingResult<()>;

    /// Delete `key`; deleting a missing key is not an error
    fn remove(&self, key: &str) -> TrackingResult<()>;

    /// Backend name (for logging)
    fn name(&self) -> &'static str;
}

/// In-memory storage, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ConsentStorage for MemoryStorage {
    fn get(&self, key: &str) -> TrackingResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> TrackingResult<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> TrackingResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// File storage: `<directory>/<key>.json`
#[derive(Debug)]
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    /// Create the storage, creating `directory` if needed
    pub fn new<P: Into<PathBuf>>(directory: P) -> TrackingResult<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| {
            TrackingError::Storage(format!(
                "Failed to create storage directory {}: {}",
                directory.display(),
                e
            ))
        })?;
        Ok(Self { directory })
    }

    fn key_file(&self, key: &str) -> TrackingResult<PathBuf> {
        if key.is_empty() || key.contains(|c: char| c == '/' || c == '\\') || key.starts_with('.') {
            return Err(TrackingError::Storage(format!("Invalid storage key: {:?}", key)));
        }
        Ok(self.directory.join(format!("{}.json", key)))
    }
}

impl ConsentStorage for FileStorage {
    fn get(&self, key: &str) -> TrackingResult<Option<String>> {
        let path = self.key_file(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TrackingError::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> TrackingResult<()> {
        let path = self.key_file(key)?;
        std::fs::write(&path, value).map_err(|e| {
            TrackingError::Storage(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    fn remove(&self, key: &str) -> TrackingResult<()> {
        let path = self.key_file(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TrackingError::Storage(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
