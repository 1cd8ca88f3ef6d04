//! Bounded HTTP connection pool.
//!
//! [`ConnectionPool`] caps the number of concurrently checked-out sockets,
//! both per host and overall, and hands out [`reqwest::Client`] handles
//! scoped to a host so keep-alive connections are actually reused. It does
//! not retry, hedge, or route — it is purely an admission bound in front of
//! the platform HTTP client.
//!
//! ```rust
//! # async fn example() -> rpc_resilience_pool::error::Result<()> {
//! use rpc_resilience_pool::PoolConfig;
//!
//! let pool = PoolConfig::builder()
//!     .max_sockets(64)
//!     .max_sockets_per_host(8)
//!     .build()?;
//!
//! let permit = pool.acquire("rpc.example.com").await?;
//! let _response = permit.client().get("https://rpc.example.com/").send().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;

use dashmap::DashMap;
use events::PoolEvent;
use rpc_resilience_core::events::EventListeners;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{PoolError, Result};

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// A bounded pool of HTTP connections, capped overall and per host.
pub struct ConnectionPool {
    total: Arc<Semaphore>,
    per_host: DashMap<String, Arc<Semaphore>>,
    clients: DashMap<String, reqwest::Client>,
    base_client: reqwest::Client,
    config: Arc<PoolConfig>,
}

impl ConnectionPool {
    pub(crate) fn new(config: PoolConfig) -> Result<Self> {
        let base_client = reqwest::Client::builder()
            .pool_idle_timeout(config.keep_alive)
            .pool_max_idle_per_host(config.max_sockets_per_host)
            .build()
            .map_err(|e| PoolError::ClientInit(e.to_string()))?;

        Ok(Self {
            total: Arc::new(Semaphore::new(config.max_sockets)),
            per_host: DashMap::new(),
            clients: DashMap::new(),
            base_client,
            config: Arc::new(config),
        })
    }

    /// Creates a new configuration builder.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    fn host_semaphore(&self, host: &str) -> Arc<Semaphore> {
        self.per_host
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_sockets_per_host)))
            .clone()
    }

    fn client_for(&self, host: &str) -> reqwest::Client {
        self.clients
            .entry(host.to_string())
            .or_insert_with(|| self.base_client.clone())
            .clone()
    }

    fn event_listeners(&self) -> &EventListeners<PoolEvent> {
        &self.config.event_listeners
    }

    /// Acquires a socket for `host`, waiting up to `max_wait_duration` (if
    /// configured) for both the per-host and total bounds to admit it.
    pub async fn acquire(&self, host: &str) -> Result<PoolPermit> {
        let host_sem = self.host_semaphore(host);
        let total_sem = Arc::clone(&self.total);
        let start = Instant::now();

        let host_permit = self.acquire_one(&host_sem, host).await?;
        let total_permit = match self.acquire_one(&total_sem, host).await {
            Ok(p) => p,
            Err(e) => {
                drop(host_permit);
                return Err(e);
            }
        };

        let concurrent_for_host =
            self.config.max_sockets_per_host - host_sem.available_permits();
        let event = PoolEvent::SocketAcquired {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
            host: host.to_string(),
            concurrent_for_host,
        };
        self.event_listeners().emit(&event);

        #[cfg(feature = "metrics")]
        {
            counter!("rpc_pool_sockets_acquired_total", "pool" => self.config.name.clone())
                .increment(1);
            gauge!("rpc_pool_concurrent_sockets", "pool" => self.config.name.clone(), "host" => host.to_string())
                .set(concurrent_for_host as f64);
        }

        Ok(PoolPermit {
            _host_permit: host_permit,
            _total_permit: total_permit,
            client: self.client_for(host),
            host: host.to_string(),
            acquired_at: start,
            config: Arc::clone(&self.config),
        })
    }

    async fn acquire_one(
        &self,
        semaphore: &Arc<Semaphore>,
        host: &str,
    ) -> Result<OwnedSemaphorePermit> {
        let semaphore = Arc::clone(semaphore);
        let result = match self.config.max_wait_duration {
            Some(duration) => match tokio::time::timeout(duration, semaphore.acquire_owned()).await {
                Ok(Ok(permit)) => Ok(permit),
                Ok(Err(_)) => Err(PoolError::Exhausted {
                    host: host.to_string(),
                }),
                Err(_) => Err(PoolError::Timeout {
                    host: host.to_string(),
                }),
            },
            None => semaphore.acquire_owned().await.map_err(|_| PoolError::Exhausted {
                host: host.to_string(),
            }),
        };

        if result.is_err() {
            self.reject(host);
        }
        result
    }

    fn reject(&self, host: &str) {
        let event = PoolEvent::SocketRejected {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
            host: host.to_string(),
        };
        self.event_listeners().emit(&event);

        #[cfg(feature = "metrics")]
        counter!("rpc_pool_sockets_rejected_total", "pool" => self.config.name.clone())
            .increment(1);
    }

    /// Total number of sockets this pool may have checked out at once.
    pub fn max_sockets(&self) -> usize {
        self.config.max_sockets
    }

    /// Per-host cap on concurrently checked-out sockets.
    pub fn max_sockets_per_host(&self) -> usize {
        self.config.max_sockets_per_host
    }
}

/// A checked-out socket. Releases both the per-host and total permits, and
/// emits a `SocketReleased` event, when dropped.
pub struct PoolPermit {
    _host_permit: OwnedSemaphorePermit,
    _total_permit: OwnedSemaphorePermit,
    client: reqwest::Client,
    host: String,
    acquired_at: Instant,
    config: Arc<PoolConfig>,
}

impl PoolPermit {
    /// The HTTP client to use for this call, scoped to the permit's host.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// The host this permit was acquired for.
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        let event = PoolEvent::SocketReleased {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
            host: self.host.clone(),
            held_for: self.acquired_at.elapsed(),
        };
        self.config.event_listeners.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn acquires_and_releases() {
        let pool = PoolConfig::builder()
            .max_sockets(4)
            .max_sockets_per_host(2)
            .build()
            .unwrap();

        let permit = pool.acquire("a.example.com").await.unwrap();
        assert_eq!(permit.host(), "a.example.com");
        drop(permit);
    }

    #[tokio::test]
    async fn per_host_bound_is_independent_of_other_hosts() {
        let pool = PoolConfig::builder()
            .max_sockets(4)
            .max_sockets_per_host(1)
            .build()
            .unwrap();

        let _a = pool.acquire("a.example.com").await.unwrap();
        let _b = pool.acquire("b.example.com").await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_per_host_fails_immediately_without_wait_duration() {
        let pool = PoolConfig::builder()
            .max_sockets(4)
            .max_sockets_per_host(1)
            .build()
            .unwrap();

        let _first = pool.acquire("a.example.com").await.unwrap();
        let err = pool.acquire("a.example.com").await.unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn exhausted_with_wait_duration_times_out() {
        let pool = PoolConfig::builder()
            .max_sockets(4)
            .max_sockets_per_host(1)
            .max_wait_duration(Some(Duration::from_millis(20)))
            .build()
            .unwrap();

        let _first = pool.acquire("a.example.com").await.unwrap();
        let err = pool.acquire("a.example.com").await.unwrap_err();
        assert!(matches!(err, PoolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn releasing_a_permit_frees_the_slot() {
        let pool = PoolConfig::builder()
            .max_sockets(4)
            .max_sockets_per_host(1)
            .build()
            .unwrap();

        let first = pool.acquire("a.example.com").await.unwrap();
        drop(first);
        pool.acquire("a.example.com").await.unwrap();
    }

    #[tokio::test]
    async fn total_bound_constrains_across_hosts() {
        let pool = PoolConfig::builder()
            .max_sockets(1)
            .max_sockets_per_host(8)
            .build()
            .unwrap();

        let _first = pool.acquire("a.example.com").await.unwrap();
        let err = pool.acquire("b.example.com").await.unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn events_fire_on_acquire_and_release() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc as StdArc;

        let acquired = StdArc::new(AtomicUsize::new(0));
        let rejected = StdArc::new(AtomicUsize::new(0));
        let a = StdArc::clone(&acquired);
        let r = StdArc::clone(&rejected);

        let pool = PoolConfig::builder()
            .max_sockets(4)
            .max_sockets_per_host(1)
            .on_socket_acquired(move |_, _| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_socket_rejected(move |_| {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let first = pool.acquire("a.example.com").await.unwrap();
        let _ = pool.acquire("a.example.com").await;
        drop(first);

        assert_eq!(acquired.load(Ordering::SeqCst), 1);
        assert_eq!(rejected.load(Ordering::SeqCst), 1);
    }
}
