//! Configuration for the connection pool.

use crate::events::PoolEvent;
use rpc_resilience_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for [`crate::ConnectionPool`].
pub struct PoolConfig {
    pub(crate) max_sockets: usize,
    pub(crate) max_sockets_per_host: usize,
    pub(crate) max_wait_duration: Option<Duration>,
    pub(crate) keep_alive: Duration,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<PoolEvent>,
}

impl PoolConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }
}

/// Builder for [`PoolConfig`].
pub struct PoolConfigBuilder {
    max_sockets: usize,
    max_sockets_per_host: usize,
    max_wait_duration: Option<Duration>,
    keep_alive: Duration,
    name: String,
    event_listeners: EventListeners<PoolEvent>,
}

impl PoolConfigBuilder {
    /// Creates a new builder with default values.
    ///
    /// Defaults: 256 total sockets, 32 per host, no wait timeout (acquire
    /// fails immediately when exhausted), 15s keep-alive.
    pub fn new() -> Self {
        Self {
            max_sockets: 256,
            max_sockets_per_host: 32,
            max_wait_duration: None,
            keep_alive: Duration::from_secs(15),
            name: "pool".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the total number of sockets the pool may have checked out at once.
    pub fn max_sockets(mut self, max: usize) -> Self {
        self.max_sockets = max;
        self
    }

    /// Sets the per-host cap on concurrently checked-out sockets.
    pub fn max_sockets_per_host(mut self, max: usize) -> Self {
        self.max_sockets_per_host = max;
        self
    }

    /// Sets how long `acquire` waits for a permit before failing.
    ///
    /// `None` (the default) means acquire fails immediately if the pool is
    /// at capacity rather than waiting.
    pub fn max_wait_duration(mut self, duration: Option<Duration>) -> Self {
        self.max_wait_duration = duration;
        self
    }

    /// Sets how long an idle socket is kept alive before being closed.
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.keep_alive = duration;
        self
    }

    /// Sets the name of this pool instance (used in events).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a socket is acquired.
    pub fn on_socket_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let PoolEvent::SocketAcquired {
                host,
                concurrent_for_host,
                ..
            } = event
            {
                f(host, *concurrent_for_host);
            }
        }));
        self
    }

    /// Registers a callback invoked when an acquisition is rejected.
    pub fn on_socket_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let PoolEvent::SocketRejected { host, .. } = event {
                f(host);
            }
        }));
        self
    }

    /// Builds the [`crate::ConnectionPool`].
    pub fn build(self) -> crate::error::Result<crate::ConnectionPool> {
        let config = PoolConfig {
            max_sockets: self.max_sockets,
            max_sockets_per_host: self.max_sockets_per_host,
            max_wait_duration: self.max_wait_duration,
            keep_alive: self.keep_alive,
            name: self.name,
            event_listeners: self.event_listeners,
        };
        crate::ConnectionPool::new(config)
    }
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
