//! Persisted key-value state.
//!
//! The engine keeps exactly two durable keys (`lastManifest` and
//! `currentSession`). [`StateStore`] abstracts the backing medium with
//! last-write-wins semantics: concurrent writers exist (a UI surface and the
//! background loop may both touch the session key) and that race is benign —
//! the latest write is observed eventually, nothing locks.

use crate::{CaptureError, LAST_MANIFEST_KEY, record::ManifestCapture};
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CaptureError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), CaptureError>;
    async fn remove(&self, key: &str) -> Result<(), CaptureError>;
}

/// In-memory store; the persistence-free option for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<FxHashMap<String, Value>>,
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CaptureError> {
        Ok(self.map.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), CaptureError> {
        self.map.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CaptureError> {
        self.map.lock().remove(key);
        Ok(())
    }
}

/// One JSON file holding the whole key-value map. Reads are served from an
/// in-memory cache; every write serializes a snapshot and rewrites the file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<FxHashMap<String, Value>>,
}

impl JsonFileStore {
    /// Open (or create) the store at `path`. A missing or unreadable file
    /// starts empty rather than failing: stale state is worth less than a
    /// working sniffer.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CaptureError> {
        let path = path.into();
        let cache = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "state file corrupt; starting empty");
                    FxHashMap::default()
                }
            },
            Err(_) => FxHashMap::default(),
        };
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> Result<Vec<u8>, CaptureError> {
        let cache = self.cache.lock();
        Ok(serde_json::to_vec_pretty(&*cache)?)
    }

    async fn flush(&self) -> Result<(), CaptureError> {
        // Snapshot under the lock, write after releasing it. Interleaved
        // flushes are last-write-wins, same as the storage this replaces.
        let bytes = self.snapshot()?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CaptureError> {
        Ok(self.cache.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), CaptureError> {
        self.cache.lock().insert(key.to_string(), value);
        self.flush().await
    }

    async fn remove(&self, key: &str) -> Result<(), CaptureError> {
        self.cache.lock().remove(key);
        self.flush().await
    }
}

/// Single-slot holder of the most recent accepted capture.
#[derive(Clone)]
pub struct CaptureStore {
    store: Arc<dyn StateStore>,
}

impl CaptureStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Replace the slot. Delivery to the ingest API is the coordinator's
    /// follow-up; a failed delivery never rolls this back.
    pub async fn set(&self, capture: &ManifestCapture) -> Result<(), CaptureError> {
        self.store
            .set(LAST_MANIFEST_KEY, serde_json::to_value(capture)?)
            .await
    }

    pub async fn get(&self) -> Result<Option<ManifestCapture>, CaptureError> {
        match self.store.get(LAST_MANIFEST_KEY).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn clear(&self) -> Result<(), CaptureError> {
        self.store.remove(LAST_MANIFEST_KEY).await
    }
}
