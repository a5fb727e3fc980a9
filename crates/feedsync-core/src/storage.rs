//! Durable key-value storage abstraction.
//!
//! The engine never touches a concrete backend directly; everything durable
//! (seen cache, negative-action ring, pending-event spill) goes through
//! `KeyValueStore`. Production wires in an origin-scoped persistent store,
//! tests use `MemoryStore`. Same core logic either way, no code change.
//!
//! The interface is synchronous and `set` can fail with quota exhaustion,
//! which the seen-cache recovers from by evicting and retrying once.

use crate::error::StorageError;
use parking_lot::Mutex;
use std::collections::HashMap;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str);
}

/// In-memory backend. Doubles as the test store and the degraded mode the
/// seen-cache falls back to when persistence is unavailable.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    /// Total bytes (keys + values) allowed; `None` means unbounded.
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes pushing total size past `quota_bytes`,
    /// mimicking an origin-scoped storage quota.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota_bytes {
            let current: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if current + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
