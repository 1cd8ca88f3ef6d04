//! Cache storage: LRU eviction plus a per-entry absolute expiry.

use crate::eviction::LruStore;
use std::time::Instant;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Synchronous (non-locking) store. [`crate::RequestCache`] wraps one in a
/// `Mutex` so it can be shared across concurrent callers.
pub(crate) struct CacheStore<V> {
    store: LruStore<String, Entry<V>>,
}

impl<V: Clone> CacheStore<V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            store: LruStore::new(capacity),
        }
    }

    /// Returns the value for `key` if present and not yet expired. An
    /// expired entry is removed on this access (§4.5 "expired entries are
    /// removed lazily on access").
    pub(crate) fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.store.get(&key.to_string()) {
            Some(entry) => entry.expires_at <= Instant::now(),
            None => return None,
        };
        if expired {
            self.store.remove(&key.to_string());
            return None;
        }
        self.store.get(&key.to_string()).map(|e| e.value.clone())
    }

    /// Inserts `value` for `key` with the given absolute expiry.
    pub(crate) fn insert(&mut self, key: String, value: V, expires_at: Instant) -> Option<V> {
        self.store
            .insert(key, Entry { value, expires_at })
            .map(|(_, e)| e.value)
    }

    pub(crate) fn remove(&mut self, key: &str) {
        self.store.remove(&key.to_string());
    }

    pub(crate) fn len(&self) -> usize {
        self.store.len()
    }

    /// Periodic cleanup pass (§4.5 "... and by a periodic cleanup"):
    /// removes every already-expired entry. Walking oldest-first lets the
    /// sweep stop as soon as it reaches a still-live entry under an
    /// insertion-ordered policy, but LRU order isn't insertion order, so
    /// this sweep is a full pass rather than a short-circuiting one.
    pub(crate) fn sweep_expired(&mut self) -> usize {
        let now = Instant::now();
        let candidates = self.store.keys_lru_order();
        let mut removed = 0;
        for key in candidates {
            if let Some(entry) = self.store.get(&key) {
                if entry.expires_at <= now {
                    self.store.remove(&key);
                    removed += 1;
                }
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn far_future() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[test]
    fn basic_get_insert() {
        let mut store = CacheStore::new(2);
        store.insert("a".into(), 1, far_future());
        assert_eq!(store.get("a"), Some(1));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn lru_eviction_on_overflow() {
        let mut store = CacheStore::new(2);
        store.insert("a".into(), 1, far_future());
        store.insert("b".into(), 2, far_future());
        store.get("a");
        let evicted = store.insert("c".into(), 3, far_future());
        assert_eq!(evicted, Some(2));
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_removed() {
        let mut store = CacheStore::new(10);
        store.insert("a".into(), 1, Instant::now() - Duration::from_millis(1));
        assert_eq!(store.get("a"), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn sweep_removes_expired_without_touching_live_entries() {
        let mut store = CacheStore::new(10);
        store.insert("expired".into(), 1, Instant::now() - Duration::from_millis(1));
        store.insert("live".into(), 2, far_future());
        let removed = store.sweep_expired();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("live"), Some(2));
    }
}
