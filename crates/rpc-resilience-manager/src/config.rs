//! Assembles the token bucket, circuit breaker, connection pool, endpoint
//! selector, cache, batch manager, and hedge manager into one
//! [`crate::RpcManager`].
//!
//! Every sub-component gets a flat set of knobs here rather than a nested
//! builder, mirroring how each component's own builder flattens its
//! internals (no caller ever hands a `CircuitBreakerConfig` value around).
//! The one component that can fail to construct is
//! [`rpc_resilience_pool::ConnectionPool`] (its `reqwest::Client` build can
//! fail); rather than making the whole manager fallible, `build()` logs the
//! failure and proceeds without a pool, so every other collaborator still
//! works and the call contract stays `Result<Value, RpcError>` instead of
//! `Result<RpcManager, ...>`. Callers can check this with
//! [`crate::RpcManager::is_degraded`].

use crate::dispatch::build_batch_dispatcher;
use crate::events::CallEvent;
use crate::metrics::Metrics;
use crate::{Inner, RpcManager};
use rpc_resilience_cache::CacheConfig;
use rpc_resilience_circuitbreaker::CircuitBreakerConfig;
use rpc_resilience_core::events::{EventListeners, FnListener};
use rpc_resilience_endpoint::EndpointSelectorConfig;
use rpc_resilience_hedge::HedgeConfig;
use rpc_resilience_pool::PoolConfig;
use rpc_resilience_tokenbucket::TokenBucketConfig;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// The retry schedule applied to infrastructure failures, shared by the
/// direct dispatch loop, the hedge attempt loop, and the batch dispatcher.
#[derive(Clone)]
pub(crate) struct RetryConfig {
    pub(crate) max_retries: u32,
    pub(crate) base_delay: Duration,
    pub(crate) cap: Duration,
}

impl Default for RetryConfig {
    /// §4.8 default: up to 2 retries, 100ms base, capped at 60s.
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            cap: Duration::from_secs(60),
        }
    }
}

/// Builder for [`RpcManager`].
pub struct RpcManagerConfigBuilder {
    name: String,
    request_timeout: Duration,
    retry: RetryConfig,

    rate_limiter_enabled: bool,
    bucket_capacity: f64,
    bucket_refill_rate: f64,
    bucket_burst_capacity: Option<f64>,

    circuit_breaker_enabled: bool,
    failure_rate_threshold: f64,
    sliding_window_size: usize,
    wait_duration_in_open: Duration,
    permitted_calls_in_half_open: usize,

    max_sockets: usize,
    max_sockets_per_host: usize,
    pool_keep_alive: Duration,

    endpoint_urls: Vec<String>,
    max_failures: u32,
    health_check_interval: Duration,

    cache_enabled: bool,
    cache_max_size: usize,
    cache_default_ttl: Duration,
    cache_ttl_overrides: Vec<(String, Duration)>,

    batch_enabled: bool,
    batchable_methods: HashSet<String>,
    batch_size: usize,
    batch_window: Duration,
    batch_max_queue_size: usize,

    hedge_enabled: bool,
    hedgeable_methods: HashSet<String>,
    hedge_delay: Duration,
    hedge_adaptive: Option<(Duration, Duration, usize)>,

    event_listeners: EventListeners<CallEvent>,
}

impl RpcManagerConfigBuilder {
    pub(crate) fn new() -> Self {
        Self {
            name: String::from("rpc-manager"),
            request_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),

            rate_limiter_enabled: true,
            bucket_capacity: 50.0,
            bucket_refill_rate: 50.0,
            bucket_burst_capacity: None,

            circuit_breaker_enabled: true,
            failure_rate_threshold: 0.6,
            sliding_window_size: 10,
            wait_duration_in_open: Duration::from_secs(30),
            permitted_calls_in_half_open: 1,

            max_sockets: 256,
            max_sockets_per_host: 32,
            pool_keep_alive: Duration::from_secs(15),

            endpoint_urls: Vec::new(),
            max_failures: 3,
            health_check_interval: Duration::from_secs(30),

            cache_enabled: true,
            cache_max_size: 100,
            cache_default_ttl: Duration::from_secs(30),
            cache_ttl_overrides: Vec::new(),

            batch_enabled: true,
            batchable_methods: HashSet::new(),
            batch_size: 8,
            batch_window: Duration::from_millis(100),
            batch_max_queue_size: 1000,

            hedge_enabled: true,
            hedgeable_methods: HashSet::new(),
            hedge_delay: Duration::from_millis(200),
            hedge_adaptive: None,

            event_listeners: EventListeners::new(),
        }
    }

    /// Names this manager instance for observability.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds an upstream endpoint URL. At least one is required;
    /// [`RpcManagerConfigBuilder::build`] panics without one, matching
    /// [`rpc_resilience_endpoint::EndpointSelectorConfigBuilder`].
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint_urls.push(url.into());
        self
    }

    /// Adds every URL in `urls` as an upstream endpoint.
    pub fn endpoints<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoint_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Sets the per-call HTTP timeout (distinct from the caller-supplied
    /// [`crate::CallOptions::builder`] deadline, which bounds the whole
    /// call including retries).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum number of retries applied to an infrastructure
    /// failure before it is surfaced to the caller.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.retry.max_retries = retries;
        self
    }

    /// Sets the base delay and cap for the retry backoff schedule.
    pub fn retry_backoff(mut self, base_delay: Duration, cap: Duration) -> Self {
        self.retry.base_delay = base_delay;
        self.retry.cap = cap;
        self
    }

    /// Disables admission control entirely. All calls pass straight
    /// through to the circuit breaker step.
    pub fn without_rate_limiter(mut self) -> Self {
        self.rate_limiter_enabled = false;
        self
    }

    /// Sets the token bucket's capacity and refill rate.
    pub fn rate_limit(mut self, capacity: f64, refill_rate: f64) -> Self {
        self.bucket_capacity = capacity;
        self.bucket_refill_rate = refill_rate;
        self
    }

    /// Sets the token bucket's burst ceiling, above its steady-state
    /// capacity.
    pub fn burst_capacity(mut self, burst_capacity: f64) -> Self {
        self.bucket_burst_capacity = Some(burst_capacity);
        self
    }

    /// Disables the circuit breaker entirely. Calls are never rejected for
    /// upstream failure history.
    pub fn without_circuit_breaker(mut self) -> Self {
        self.circuit_breaker_enabled = false;
        self
    }

    /// Sets the circuit breaker's failure rate threshold and sliding
    /// window size.
    pub fn circuit_breaker(mut self, failure_rate_threshold: f64, sliding_window_size: usize) -> Self {
        self.failure_rate_threshold = failure_rate_threshold;
        self.sliding_window_size = sliding_window_size;
        self
    }

    /// Sets how long the breaker stays open before probing again, and how
    /// many concurrent probes it admits while half-open.
    pub fn circuit_breaker_recovery(mut self, wait_duration_in_open: Duration, permitted_calls_in_half_open: usize) -> Self {
        self.wait_duration_in_open = wait_duration_in_open;
        self.permitted_calls_in_half_open = permitted_calls_in_half_open;
        self
    }

    /// Sets the connection pool's total and per-host socket caps.
    pub fn pool_limits(mut self, max_sockets: usize, max_sockets_per_host: usize) -> Self {
        self.max_sockets = max_sockets;
        self.max_sockets_per_host = max_sockets_per_host;
        self
    }

    /// Sets how long an idle pooled socket is kept alive.
    pub fn pool_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.pool_keep_alive = keep_alive;
        self
    }

    /// Sets how many consecutive failures quarantine an endpoint, and how
    /// long until a quarantined endpoint is offered again as a probe.
    pub fn endpoint_health(mut self, max_failures: u32, health_check_interval: Duration) -> Self {
        self.max_failures = max_failures;
        self.health_check_interval = health_check_interval;
        self
    }

    /// Disables response caching entirely.
    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    /// Sets the cache's maximum entry count and default TTL.
    pub fn cache(mut self, max_size: usize, default_ttl: Duration) -> Self {
        self.cache_max_size = max_size;
        self.cache_default_ttl = default_ttl;
        self
    }

    /// Overrides the cache TTL for one method.
    pub fn cache_ttl_for(mut self, method: impl Into<String>, ttl: Duration) -> Self {
        self.cache_ttl_overrides.push((method.into(), ttl));
        self
    }

    /// Disables batch coalescing entirely; batchable methods dispatch
    /// directly instead.
    pub fn without_batching(mut self) -> Self {
        self.batch_enabled = false;
        self
    }

    /// Adds a method to the batchable whitelist.
    pub fn batchable_method(mut self, method: impl Into<String>) -> Self {
        self.batchable_methods.insert(method.into());
        self
    }

    /// Sets the batch size and window that trigger a flush.
    pub fn batch_trigger(mut self, batch_size: usize, batch_window: Duration) -> Self {
        self.batch_size = batch_size;
        self.batch_window = batch_window;
        self
    }

    /// Sets the maximum number of outstanding batch slots before
    /// `enqueue` rejects new calls with `BATCH_QUEUE_FULL`.
    pub fn batch_max_queue_size(mut self, size: usize) -> Self {
        self.batch_max_queue_size = size;
        self
    }

    /// Disables hedged dispatch entirely; hedgeable methods dispatch
    /// directly instead.
    pub fn without_hedging(mut self) -> Self {
        self.hedge_enabled = false;
        self
    }

    /// Adds a method to the hedgeable whitelist.
    pub fn hedgeable_method(mut self, method: impl Into<String>) -> Self {
        self.hedgeable_methods.insert(method.into());
        self
    }

    /// Sets a fixed delay before firing the backup attempt for hedged
    /// calls.
    pub fn hedge_delay(mut self, delay: Duration) -> Self {
        self.hedge_delay = delay;
        self.hedge_adaptive = None;
        self
    }

    /// Uses an adaptive, P95-tracking delay instead of a fixed one for
    /// hedged calls.
    pub fn hedge_adaptive_delay(mut self, min: Duration, max: Duration, window: usize) -> Self {
        self.hedge_adaptive = Some((min, max, window));
        self
    }

    /// Registers a callback invoked when a call completes successfully,
    /// with its end-to-end duration including any retries.
    pub fn on_call_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CallEvent::Completed { method, duration, .. } = event {
                f(method, *duration);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call fails after exhausting any
    /// applicable retries.
    pub fn on_call_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Duration, &str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CallEvent::Failed { method, duration, error, .. } = event {
                f(method, *duration, error);
            }
        }));
        self
    }

    /// Assembles every configured collaborator into an [`RpcManager`].
    ///
    /// Panics if no endpoint URL was configured, matching
    /// [`rpc_resilience_endpoint::EndpointSelectorConfigBuilder::build`].
    /// If the connection pool fails to construct (its `reqwest::Client`
    /// build failed), logs the failure and returns a manager with no pool;
    /// see [`crate::RpcManager::is_degraded`].
    pub fn build(self) -> RpcManager {
        let metrics = Arc::new(Metrics::new());

        let bucket = self.rate_limiter_enabled.then(|| {
            let mut builder = TokenBucketConfig::builder()
                .capacity(self.bucket_capacity)
                .refill_rate(self.bucket_refill_rate)
                .name(format!("{}-bucket", self.name));
            if let Some(burst) = self.bucket_burst_capacity {
                builder = builder.burst_capacity(burst);
            }
            builder.build()
        });

        let breaker = self.circuit_breaker_enabled.then(|| {
            let metrics = Arc::clone(&metrics);
            CircuitBreakerConfig::builder()
                .failure_rate_threshold(self.failure_rate_threshold)
                .sliding_window_size(self.sliding_window_size)
                .wait_duration_in_open(self.wait_duration_in_open)
                .permitted_calls_in_half_open(self.permitted_calls_in_half_open)
                .name(format!("{}-breaker", self.name))
                .on_state_transition(move |_from, _to| metrics.record_breaker_transition())
                .build()
        });

        let selector = EndpointSelectorConfig::builder()
            .endpoints(self.endpoint_urls)
            .max_failures(self.max_failures)
            .health_check_interval(self.health_check_interval)
            .name(format!("{}-endpoints", self.name))
            .build();

        let (pool, degraded) = match PoolConfig::builder()
            .max_sockets(self.max_sockets)
            .max_sockets_per_host(self.max_sockets_per_host)
            .keep_alive(self.pool_keep_alive)
            .name(format!("{}-pool", self.name))
            .build()
        {
            Ok(pool) => (Some(Arc::new(pool)), false),
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%error, "connection pool failed to construct; manager will reject every call with POOL_EXHAUSTED until rebuilt");
                #[cfg(not(feature = "tracing"))]
                let _ = error;
                (None, true)
            }
        };

        let cache = self.cache_enabled.then(|| {
            let metrics_hit = Arc::clone(&metrics);
            let metrics_miss = Arc::clone(&metrics);
            let metrics_coalesced = Arc::clone(&metrics);
            let mut builder = CacheConfig::builder()
                .max_size(self.cache_max_size)
                .default_ttl(self.cache_default_ttl)
                .name(format!("{}-cache", self.name))
                .on_hit(move || metrics_hit.record_cache_hit())
                .on_miss(move || metrics_miss.record_cache_miss())
                .on_coalesced(move || metrics_coalesced.record_cache_coalesced());
            for (method, ttl) in self.cache_ttl_overrides {
                builder = builder.ttl_for_method(method, ttl);
            }
            builder.build()
        });

        let batch = self.batch_enabled.then(|| {
            let dispatcher = build_batch_dispatcher(
                bucket.clone(),
                breaker.clone(),
                pool.clone(),
                selector.clone(),
                self.retry.clone(),
                self.request_timeout,
            );
            let metrics = Arc::clone(&metrics);
            rpc_resilience_batch::BatchManager::builder()
                .batchable_methods(self.batchable_methods)
                .batch_size(self.batch_size)
                .batch_window(self.batch_window)
                .max_queue_size(self.batch_max_queue_size)
                .dispatcher(dispatcher)
                .name(format!("{}-batch", self.name))
                .on_flush(move |slot_count| metrics.record_batch_flush(slot_count))
                .build()
                .expect("dispatcher is always configured above")
        });

        let hedge = self.hedge_enabled.then(|| {
            let metrics_primary = Arc::clone(&metrics);
            let metrics_backup = Arc::clone(&metrics);
            let metrics_all_failed = Arc::clone(&metrics);
            let mut builder = HedgeConfig::builder()
                .name(format!("{}-hedge", self.name))
                .on_primary_won(move |_duration| metrics_primary.record_hedge_primary_won())
                .on_backup_won(move |_duration| metrics_backup.record_hedge_backup_won())
                .on_all_failed(move |_attempts| metrics_all_failed.record_hedge_all_failed());
            builder = match self.hedge_adaptive {
                Some((min, max, window)) => builder.adaptive_delay(min, max, window),
                None => builder.delay(self.hedge_delay),
            };
            builder.build()
        });

        RpcManager {
            inner: Arc::new(Inner {
                name: self.name,
                bucket,
                breaker,
                pool,
                selector,
                cache,
                batch,
                hedge,
                hedgeable_methods: self.hedgeable_methods,
                retry: self.retry,
                request_timeout: self.request_timeout,
                metrics,
                degraded_pool: degraded,
                event_listeners: self.event_listeners,
            }),
        }
    }
}

impl Default for RpcManagerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
