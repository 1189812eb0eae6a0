//! Result cache consulted before an action's query runs.
//!
//! Entries are keyed by application, action and the fingerprint of the
//! expanded parameters.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use dbaction_core::TypedTable;
use lru::LruCache;
use parking_lot::Mutex;

/// A fingerprint to result store.
pub trait ResultCache: Send + Sync {
    fn get(&self, app_id: &str, action_id: &str, fingerprint: &str) -> Option<TypedTable>;

    fn put(&self, app_id: &str, action_id: &str, fingerprint: &str, table: TypedTable);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    app_id: String,
    action_id: String,
    fingerprint: String,
}

impl CacheKey {
    fn new(app_id: &str, action_id: &str, fingerprint: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            action_id: action_id.to_string(),
            fingerprint: fingerprint.to_string(),
        }
    }
}

struct CacheEntry {
    table: TypedTable,
    expires_at: Instant,
}

/// Bounded LRU cache with a fixed time-to-live per entry.
pub struct LruResultCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl LruResultCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Returns `None` when `capacity` is zero.
    pub fn with_capacity(capacity: usize, ttl: Duration) -> Option<Self> {
        NonZeroUsize::new(capacity).map(|c| Self::new(c, ttl))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for LruResultCache {
    fn get(&self, app_id: &str, action_id: &str, fingerprint: &str) -> Option<TypedTable> {
        let key = CacheKey::new(app_id, action_id, fingerprint);
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.table.clone());
            }
            entries.pop(&key);
        }
        None
    }

    fn put(&self, app_id: &str, action_id: &str, fingerprint: &str, table: TypedTable) {
        let key = CacheKey::new(app_id, action_id, fingerprint);
        let expires_at = Instant::now() + self.ttl;
        self.entries.lock().put(key, CacheEntry { table, expires_at });
    }
}
