//! Durable record of which items have already been shown to the viewer.
//!
//! Backed by the injected key-value store under a single key, serialized as
//! a versioned JSON envelope. Hydration is lazy (first `has`/`mark` touch)
//! and expiry is lazy too: entries older than the TTL are filtered out when
//! read, never swept proactively.
//!
//! # Quota recovery
//! A failed write evicts roughly the oldest half of the entries and retries
//! once. If the retry also fails the cache keeps operating in memory for
//! the rest of the session without persistence.

use crate::config::SyncConfig;
use crate::models::ItemKey;
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const STORAGE_KEY: &str = "feedsync.seen_cache";

/// Bump when the envelope layout changes; old versions are discarded and
/// rebuilt, never migrated.
const SEEN_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SeenEnvelope {
    schema_version: u32,
    /// item key string -> unix ms of first sighting.
    entries: HashMap<String, i64>,
}

pub struct SeenCache {
    store: Arc<dyn KeyValueStore>,
    ttl_ms: i64,
    capacity: usize,
    /// `None` until first touch; hydrated from storage on demand.
    entries: Option<HashMap<String, i64>>,
    /// Set after a persist retry also fails; memory-only for the session.
    persistence_disabled: bool,
}

impl SeenCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &SyncConfig) -> Self {
        Self {
            store,
            ttl_ms: config.seen_ttl.as_millis() as i64,
            capacity: config.seen_capacity.max(1),
            entries: None,
            persistence_disabled: false,
        }
    }

    /// Whether `key` was seen within the TTL. Expired entries read as absent.
    pub fn has(&mut self, key: &ItemKey, now_ms: i64) -> bool {
        let ttl_ms = self.ttl_ms;
        let storage_key = key.to_string();
        let entries = self.hydrated(now_ms);
        match entries.get(&storage_key) {
            Some(&first_seen) if now_ms - first_seen < ttl_ms => true,
            Some(_) => {
                entries.remove(&storage_key);
                false
            }
            None => false,
        }
    }

    /// Record first sight of `key`. Enforces the capacity bound before
    /// inserting and persists the updated map.
    pub fn mark(&mut self, key: &ItemKey, now_ms: i64) {
        let capacity = self.capacity;
        let storage_key = key.to_string();
        let entries = self.hydrated(now_ms);
        if entries.contains_key(&storage_key) {
            return;
        }
        while entries.len() >= capacity {
            if !evict_oldest(entries, 1) {
                break;
            }
        }
        entries.insert(storage_key, now_ms);
        self.persist();
    }

    pub fn len(&mut self, now_ms: i64) -> usize {
        self.hydrated(now_ms).len()
    }

    pub fn is_persistence_disabled(&self) -> bool {
        self.persistence_disabled
    }

    fn hydrated(&mut self, now_ms: i64) -> &mut HashMap<String, i64> {
        if self.entries.is_none() {
            let loaded = self.load(now_ms);
            self.entries = Some(loaded);
        }
        self.entries.get_or_insert_with(HashMap::new)
    }

    fn load(&self, now_ms: i64) -> HashMap<String, i64> {
        let Some(raw) = self.store.get(STORAGE_KEY) else {
            return HashMap::new();
        };
        let envelope: SeenEnvelope = match serde_json::from_str(&raw) {
            Ok(env) => env,
            Err(err) => {
                tracing::warn!("seen_cache: corrupt envelope, rebuilding ({err})");
                return HashMap::new();
            }
        };
        if envelope.schema_version != SEEN_SCHEMA_VERSION {
            tracing::info!(
                "seen_cache: schema version mismatch (stored={} current={}), discarding",
                envelope.schema_version,
                SEEN_SCHEMA_VERSION
            );
            return HashMap::new();
        }
        // Lazy expiry: TTL filtering happens here, not on a sweep timer.
        envelope
            .entries
            .into_iter()
            .filter(|(_, first_seen)| now_ms - first_seen < self.ttl_ms)
            .collect()
    }

    fn persist(&mut self) {
        if self.persistence_disabled {
            return;
        }
        if self.write_current().is_ok() {
            return;
        }
        // Quota pressure: drop the oldest half and try once more.
        if let Some(entries) = self.entries.as_mut() {
            let half = entries.len() / 2;
            evict_oldest(entries, half);
            tracing::warn!(
                evicted = half,
                "seen_cache: write failed, evicted oldest half and retrying"
            );
        }
        if self.write_current().is_err() {
            self.persistence_disabled = true;
            tracing::warn!("seen_cache: persistence unavailable, continuing in memory only");
        }
    }

    fn write_current(&self) -> Result<(), ()> {
        let envelope = SeenEnvelope {
            schema_version: SEEN_SCHEMA_VERSION,
            entries: self.entries.clone().unwrap_or_default(),
        };
        let raw = serde_json::to_string(&envelope).map_err(|_| ())?;
        self.store.set(STORAGE_KEY, &raw).map_err(|_| ())
    }
}

/// Remove up to `count` entries with the oldest first-seen timestamps.
/// Returns whether anything was removed.
fn evict_oldest(entries: &mut HashMap<String, i64>, count: usize) -> bool {
    if count == 0 || entries.is_empty() {
        return false;
    }
    let mut by_age: Vec<(String, i64)> = entries
        .iter()
        .map(|(k, &ts)| (k.clone(), ts))
        .collect();
    by_age.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    for (key, _) in by_age.into_iter().take(count) {
        entries.remove(&key);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    fn cache_with(store: Arc<dyn KeyValueStore>) -> SeenCache {
        SeenCache::new(store, &SyncConfig::default())
    }

    fn key(id: &str) -> ItemKey {
        ItemKey::new("post", id)
    }

    #[test]
    fn test_mark_then_has() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut cache = cache_with(store);
        assert!(!cache.has(&key("1"), 0));
        cache.mark(&key("1"), 0);
        assert!(cache.has(&key("1"), 0));
    }

    #[test]
    fn test_survives_rehydration() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        {
            let mut cache = cache_with(store.clone());
            cache.mark(&key("1"), 1000);
        }
        let mut fresh = cache_with(store);
        assert!(fresh.has(&key("1"), 2000));
    }

    #[test]
    fn test_ttl_expiry_is_lazy() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut cache = cache_with(store.clone());
        cache.mark(&key("1"), 0);

        // Just inside the 48h window.
        assert!(cache.has(&key("1"), 48 * HOUR_MS - 1));
        // At the boundary the entry reads as absent.
        assert!(!cache.has(&key("1"), 48 * HOUR_MS));

        // A fresh hydration filters it out as well.
        let mut fresh = cache_with(store);
        assert!(!fresh.has(&key("1"), 48 * HOUR_MS));
    }

    #[test]
    fn test_capacity_evicts_exactly_one_oldest() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut config = SyncConfig::default();
        config.seen_capacity = 1000;
        let mut cache = SeenCache::new(store, &config);

        for i in 0..1000 {
            cache.mark(&key(&i.to_string()), i as i64);
        }
        assert_eq!(cache.len(0), 1000);

        cache.mark(&key("new"), 5000);
        assert_eq!(cache.len(0), 1000);
        assert!(!cache.has(&key("0"), 5000));
        assert!(cache.has(&key("1"), 5000));
        assert!(cache.has(&key("new"), 5000));
    }

    #[test]
    fn test_quota_recovery_halves_then_retries() {
        // Room for a few hundred entries, then writes start failing.
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::with_quota(8 * 1024));
        let mut cache = cache_with(store.clone());

        for i in 0..600 {
            cache.mark(&key(&format!("{i:04}")), i as i64);
        }
        // The cache shrank itself rather than crashing or going dark.
        assert!(!cache.is_persistence_disabled());
        let persisted = store.get("feedsync.seen_cache").unwrap();
        let envelope: serde_json::Value = serde_json::from_str(&persisted).unwrap();
        let persisted_len = envelope["entries"].as_object().unwrap().len();
        assert!(persisted_len < 600);
        // Newest entries survive the halving.
        assert!(cache.has(&key("0599"), 600));
    }

    #[test]
    fn test_degrades_to_memory_when_storage_unusable() {
        // Quota too small for even a single entry: retry fails too.
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::with_quota(4));
        let mut cache = cache_with(store);
        cache.mark(&key("1"), 0);
        assert!(cache.is_persistence_disabled());
        // Still fully functional in memory.
        assert!(cache.has(&key("1"), 0));
        cache.mark(&key("2"), 0);
        assert!(cache.has(&key("2"), 0));
    }

    #[test]
    fn test_schema_mismatch_discards() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store
            .set(
                "feedsync.seen_cache",
                r#"{"schema_version":99,"entries":{"post:1":0}}"#,
            )
            .unwrap();
        let mut cache = cache_with(store);
        assert!(!cache.has(&key("1"), 0));
    }
}
