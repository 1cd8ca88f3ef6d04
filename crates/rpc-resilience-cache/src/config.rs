//! Configuration for the request cache.

use crate::events::CacheEvent;
use rpc_resilience_core::events::{EventListeners, FnListener};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for [`crate::RequestCache`].
pub struct CacheConfig {
    pub(crate) max_size: usize,
    pub(crate) default_ttl: Duration,
    pub(crate) ttl_overrides: HashMap<String, Duration>,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
    pub(crate) name: String,
}

impl CacheConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Returns the TTL for `method`: the per-method override if one was
    /// registered, otherwise `default_ttl` (§4.5 "per-method TTL overrides").
    pub(crate) fn ttl_for(&self, method: &str) -> Duration {
        self.ttl_overrides
            .get(method)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

/// Builder for [`CacheConfig`].
pub struct CacheConfigBuilder {
    max_size: usize,
    default_ttl: Duration,
    ttl_overrides: HashMap<String, Duration>,
    event_listeners: EventListeners<CacheEvent>,
    name: String,
}

impl CacheConfigBuilder {
    /// Creates a new builder with default values.
    ///
    /// Defaults match §4.5: 100 entries, 30s default TTL, no per-method
    /// overrides.
    pub fn new() -> Self {
        Self {
            max_size: 100,
            default_ttl: Duration::from_secs(30),
            ttl_overrides: HashMap::new(),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the maximum number of entries in the cache.
    ///
    /// Default: 100
    pub fn max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Sets the TTL used for methods without a registered override.
    ///
    /// Default: 30s
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Registers a TTL override for a specific JSON-RPC method.
    pub fn ttl_for_method(mut self, method: impl Into<String>, ttl: Duration) -> Self {
        self.ttl_overrides.insert(method.into(), ttl);
        self
    }

    /// Sets the name of this cache instance for observability.
    ///
    /// Default: `"<unnamed>"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a cache hit occurs.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Hit { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback when a cache miss occurs.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Miss { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback when a concurrent caller joins an in-flight
    /// producer instead of starting its own.
    pub fn on_coalesced<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Coalesced { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback when an entry is evicted from the cache.
    pub fn on_eviction<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Eviction { .. }) {
                f();
            }
        }));
        self
    }

    /// Builds the request cache.
    pub fn build(self) -> crate::RequestCache {
        let config = CacheConfig {
            max_size: self.max_size,
            default_ttl: self.default_ttl,
            ttl_overrides: self.ttl_overrides,
            event_listeners: self.event_listeners,
            name: self.name,
        };
        crate::RequestCache::new(config)
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CacheConfig::builder().build();
        assert_eq!(config.max_size, 100);
        assert_eq!(config.ttl_for("anything"), Duration::from_secs(30));
    }

    #[test]
    fn per_method_override_takes_precedence() {
        let config = CacheConfig::builder()
            .default_ttl(Duration::from_secs(30))
            .ttl_for_method("getBlock", Duration::from_secs(300))
            .build();

        assert_eq!(config.ttl_for("getBlock"), Duration::from_secs(300));
        assert_eq!(config.ttl_for("getBalance"), Duration::from_secs(30));
    }
}
