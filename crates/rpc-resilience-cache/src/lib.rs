//! Request/response caching with coalesced misses.
//!
//! `RequestCache` stores JSON-RPC results keyed by
//! [`canonical_params_key`](rpc_resilience_core::wire::canonical_params_key)
//! under an LRU eviction policy with a per-entry, per-method TTL (§4.5).
//!
//! Unlike the Tower-middleware version this crate is adapted from, the cache
//! here is a plain orchestrator collaborator rather than a `tower::Service`
//! wrapper: the caller looks the key up, and on a miss calls
//! [`RequestCache::coalesce`] with a producer closure that performs the
//! actual dispatch (including its own retry loop). Concurrent misses on the
//! same key join the first caller's in-flight producer instead of each
//! starting their own (§4.5 "coalesce concurrent identical misses"),
//! mirroring the leader/waiter pattern of the teacher crate's
//! `tower-resilience-coalesce`, adapted here from a `Service`-wrapping layer
//! to a standalone cache method.
//!
//! ```rust,no_run
//! use rpc_resilience_cache::RequestCache;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let cache = RequestCache::builder()
//!     .max_size(1000)
//!     .default_ttl(Duration::from_secs(30))
//!     .build();
//!
//! let result = cache
//!     .coalesce("getBalance:[...]", "getBalance", || async {
//!         Ok(serde_json::json!({"balance": 42}))
//!     })
//!     .await;
//! # let _ = result;
//! # }
//! ```

mod config;
mod error;
mod events;
mod eviction;
mod store;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::CacheError;
pub use events::CacheEvent;

use dashmap::DashMap;
use rpc_resilience_core::RpcError;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use store::CacheStore;
use tokio::sync::broadcast;

/// What a coalescing leader reports to any waiters that joined it.
type LeaderOutcome = Result<Value, RpcError>;

/// A shared cache of JSON-RPC results, with LRU eviction, per-method TTLs,
/// and coalescing of concurrent identical misses.
///
/// Cheap to clone; clones share the same underlying store.
#[derive(Clone)]
pub struct RequestCache {
    store: Arc<Mutex<CacheStore<Value>>>,
    in_flight: Arc<DashMap<String, broadcast::Sender<LeaderOutcome>>>,
    config: Arc<CacheConfig>,
}

impl RequestCache {
    fn new(config: CacheConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(CacheStore::new(config.max_size))),
            in_flight: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Creates a builder with defaults; see [`CacheConfigBuilder`].
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Returns the cached value for `key`, if present and unexpired.
    ///
    /// Emits a `Hit` or `Miss` event. Most callers want
    /// [`RequestCache::coalesce`] instead, which also handles misses.
    pub fn get(&self, key: &str) -> Option<Value> {
        let hit = {
            let mut store = self.store.lock().unwrap();
            store.get(key)
        };

        let now = Instant::now();
        if hit.is_some() {
            self.config.event_listeners.emit(&CacheEvent::Hit {
                pattern_name: self.config.name.clone(),
                timestamp: now,
                key: key.to_string(),
            });
        } else {
            self.config.event_listeners.emit(&CacheEvent::Miss {
                pattern_name: self.config.name.clone(),
                timestamp: now,
                key: key.to_string(),
            });
        }
        hit
    }

    /// Inserts `value` for `key`, expiring after `ttl` from now.
    ///
    /// If inserting this entry evicted another to stay within `max_size`,
    /// emits an `Eviction` event.
    pub fn set(&self, key: &str, value: Value, ttl: std::time::Duration) {
        let evicted = {
            let mut store = self.store.lock().unwrap();
            let was_full = store.len() >= self.config.max_size;
            store.insert(key.to_string(), value, Instant::now() + ttl);
            was_full
        };

        if evicted {
            self.config.event_listeners.emit(&CacheEvent::Eviction {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                key: key.to_string(),
            });
        }
    }

    /// Returns the TTL to use for `method`: a registered per-method override
    /// if one exists, otherwise the configured default.
    pub fn ttl_for(&self, method: &str) -> std::time::Duration {
        self.config.ttl_for(method)
    }

    /// Looks `key` up, and on a miss runs `producer` to fill it, coalescing
    /// concurrent misses on the same key onto a single producer invocation.
    ///
    /// The first caller to miss becomes the *leader*: it registers a
    /// broadcast channel under `key` in `in_flight`, then spawns `producer`
    /// on its own detached task and awaits the broadcast like any other
    /// *waiter* that joins in the meantime. Running the producer off the
    /// leader's own future means a timeout or cancellation on the leader's
    /// call drops only the leader's `recv`, never the producer: it keeps
    /// running, still publishes its outcome to every waiter, and still
    /// populates the store (§5 "detaches without aborting the producer if
    /// other waiters remain"). A successful outcome is written to the store
    /// under `method`'s TTL before being broadcast.
    ///
    /// If the producer task is dropped before it sends (panic) waiters
    /// observe [`CacheError::LeaderLost`] surfaced as
    /// [`RpcError::Infrastructure`], which is safe to retry.
    pub async fn coalesce<F, Fut>(
        &self,
        key: &str,
        method: &str,
        producer: F,
    ) -> Result<Value, RpcError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        // Try to become the leader by being the one who inserts the
        // broadcast sender for this key. The subscribe-while-occupied case
        // happens inside the same DashMap shard lock as the occupied check,
        // so a waiter can never subscribe after the leader has already sent
        // (which would silently drop the message).
        let mut rx = match self.in_flight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                self.config.event_listeners.emit(&CacheEvent::Coalesced {
                    pattern_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    key: key.to_string(),
                });
                let rx = entry.get().subscribe();
                drop(entry);
                rx
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let (tx, rx) = broadcast::channel(1);
                entry.insert(tx.clone());

                let this = self.clone();
                let key = key.to_string();
                let method = method.to_string();
                tokio::spawn(async move {
                    let outcome = producer().await;
                    if let Ok(value) = &outcome {
                        this.set(&key, value.clone(), this.ttl_for(&method));
                    }
                    this.in_flight.remove(&key);
                    let _ = tx.send(outcome);
                });

                rx
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(RpcError::Infrastructure {
                message: CacheError::LeaderLost.to_string(),
            }),
        }
    }
}
