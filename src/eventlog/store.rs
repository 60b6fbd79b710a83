//! Event log persistence
//!
//! The log is stored as one versioned JSON document under a single key:
//!
//! ```text
//! {"version": 1, "events": [EventLogEntry, ...], "updatedAt": "2026-01-01T00:00:00Z"}
//! ```
//!
//! A document with any other version is discarded whole.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entry::EventLogEntry;
use crate::error::PersistenceError;

/// Current document version
pub const SCHEMA_VERSION: u32 = 1;

/// Default key the log is stored under
pub const DEFAULT_STORAGE_KEY: &str = "overlay-event-log";

/// Key-value persistence port
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `None` when the key was never written
    fn get(&self, key: &str) -> Result<Option<Bytes>, PersistenceError>;

    /// Replace a value
    fn put(&self, key: &str, value: Bytes) -> Result<(), PersistenceError>;

    /// Delete a value; missing keys are not an error
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedLog {
    pub version: u32,
    pub events: Vec<EventLogEntry>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedLog {
    pub fn new(events: Vec<EventLogEntry>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            events,
            updated_at: Utc::now(),
        }
    }

    pub fn encode(&self) -> Result<Bytes, PersistenceError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decode a stored document
    ///
    /// Returns `None` for a version mismatch. Every entry comes back inactive.
    pub fn decode(bytes: &[u8]) -> Result<Option<Self>, PersistenceError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let version = value.get("version").and_then(Value::as_u64);
        if version != Some(u64::from(SCHEMA_VERSION)) {
            tracing::warn!(found = ?version, expected = SCHEMA_VERSION, "Discarding event log with unknown version");
            return Ok(None);
        }

        let mut log: PersistedLog = serde_json::from_value(value)?;
        for entry in &mut log.events {
            entry.is_active = false;
        }
        Ok(Some(log))
    }
}

/// Load the log stored under `key`
///
/// Missing, unreadable and mismatched documents all yield an empty log.
pub fn load_events(store: &dyn KeyValueStore, key: &str) -> Vec<EventLogEntry> {
    let bytes = match store.get(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(key = key, error = %e, "Event log unreadable, starting empty");
            return Vec::new();
        }
    };

    match PersistedLog::decode(&bytes) {
        Ok(Some(log)) => log.events,
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(key = key, error = %e, "Event log corrupt, starting empty");
            Vec::new()
        }
    }
}

/// Store the log under `key`
pub fn save_events(
    store: &dyn KeyValueStore,
    key: &str,
    events: &[EventLogEntry],
) -> Result<(), PersistenceError> {
    let bytes = PersistedLog::new(events.to_vec()).encode()?;
    store.put(key, bytes)
}

/// In-memory store with an optional size quota
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Bytes>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes larger than `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            quota: Some(bytes),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Bytes>, PersistenceError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: Bytes) -> Result<(), PersistenceError> {
        if let Some(quota) = self.quota {
            if value.len() > quota {
                return Err(PersistenceError::Backend(format!(
                    "quota exceeded: {} > {} bytes",
                    value.len(),
                    quota
                )));
            }
        }
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// One JSON file per key in a directory
///
/// Writes go to a temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(PersistenceError::Backend("storage root is empty".to_string()));
        }
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        if key.trim().is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(PersistenceError::Backend(format!("invalid key {:?}", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Bytes>, PersistenceError> {
        match std::fs::read(self.path(key)?) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: Bytes) -> Result<(), PersistenceError> {
        let target = self.path(key)?;
        let temp = target.with_extension("json.tmp");

        std::fs::write(&temp, &value)?;
        if let Err(e) = std::fs::rename(&temp, &target) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        match std::fs::remove_file(self.path(key)?) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
