//! LRU-backed storage for the request cache.
//!
//! The teacher crate this is adapted from supported LRU/LFU/FIFO eviction
//! behind a common trait. The transport spec names LRU explicitly (§4.5
//! "Eviction: LRU when size exceeds `max_size`"), so this crate keeps only
//! that policy; the trait indirection is dropped along with it.

use std::hash::Hash;
use std::num::NonZeroUsize;

/// Thin wrapper over [`lru::LruCache`] sized for the request cache's
/// `(key, entry)` pairs.
pub(crate) struct LruStore<K, V> {
    cache: lru::LruCache<K, V>,
}

impl<K: Hash + Eq, V> LruStore<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(100).unwrap());
        Self {
            cache: lru::LruCache::new(cap),
        }
    }

    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        self.cache.get(key)
    }

    /// Inserts `value`, returning the evicted `(key, value)` pair if the
    /// cache was full.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.cache.push(key, value)
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        self.cache.pop(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }

    /// Iterates keys oldest-to-most-recently-used, for lazy expiry sweeps.
    pub(crate) fn keys_lru_order(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.cache.iter().rev().map(|(k, _)| k.clone()).collect()
    }
}
