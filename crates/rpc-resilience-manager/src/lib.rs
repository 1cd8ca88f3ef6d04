//! Orchestrator for the resilient RPC transport.
//!
//! [`RpcManager`] is the one place in this workspace allowed to know about
//! every collaborator: the token bucket, circuit breaker, connection pool,
//! endpoint selector, request cache, batch manager, and hedge manager. Each
//! of those crates is usable standalone and has no notion of the others;
//! this crate wires them into a single `call()` entry point with one
//! control flow:
//!
//! 1. Admission: the token bucket gates the call (`RATE_LIMITED`).
//! 2. Gate: the circuit breaker gates the call (`CIRCUIT_OPEN`).
//! 3. Cache: a coalescing lookup short-circuits repeat calls within TTL.
//! 4. Route: batchable/hedgeable methods take their own path; everything
//!    else dispatches directly.
//! 5. Connect: a host-scoped permit is acquired from the connection pool
//!    (`POOL_EXHAUSTED`).
//! 6. Select: the endpoint selector picks an upstream (`NO_ENDPOINT`).
//! 7. Dispatch: the request goes out over HTTPS and the response is
//!    decoded and classified.
//! 8. Classify: the outcome updates the breaker and the endpoint's health,
//!    and infrastructure failures are retried with backoff, re-entering at
//!    step 1.
//!
//! ```rust,no_run
//! use rpc_resilience_manager::RpcManager;
//!
//! # async fn example() -> Result<(), rpc_resilience_core::RpcError> {
//! let manager = RpcManager::builder()
//!     .endpoint("https://rpc-a.example.com")
//!     .endpoint("https://rpc-b.example.com")
//!     .batchable_method("getBalance")
//!     .hedgeable_method("getSlot")
//!     .build();
//!
//! let slot = manager
//!     .call("getSlot", serde_json::json!([]), Default::default())
//!     .await?;
//! # let _ = slot;
//! # Ok(())
//! # }
//! ```

mod cancellation;
mod config;
mod dispatch;
mod events;
mod metrics;
mod options;

pub use cancellation::CancellationSignal;
pub use config::RpcManagerConfigBuilder;
pub use events::CallEvent;
pub use metrics::MetricsSnapshot;
pub use options::{CallOptions, CallOptionsBuilder};
pub use rpc_resilience_core::RpcError;
pub use rpc_resilience_core::health::TriggerHealth;
pub use rpc_resilience_endpoint::EndpointHealth;

use config::RetryConfig;
use metrics::Metrics;
use rpc_resilience_batch::BatchManager;
use rpc_resilience_circuitbreaker::CircuitBreaker;
use rpc_resilience_core::events::EventListeners;
use rpc_resilience_core::wire::JsonRpcRequest;
use rpc_resilience_endpoint::{EndpointHandle, EndpointSelector};
use rpc_resilience_hedge::{Attempt, HedgedManager};
use rpc_resilience_pool::ConnectionPool;
use rpc_resilience_tokenbucket::TokenBucket;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Inner {
    name: String,
    bucket: Option<TokenBucket>,
    breaker: Option<CircuitBreaker>,
    pool: Option<Arc<ConnectionPool>>,
    selector: EndpointSelector,
    cache: Option<rpc_resilience_cache::RequestCache>,
    batch: Option<BatchManager>,
    hedge: Option<HedgedManager>,
    hedgeable_methods: HashSet<String>,
    retry: RetryConfig,
    request_timeout: Duration,
    metrics: Arc<Metrics>,
    degraded_pool: bool,
    event_listeners: EventListeners<CallEvent>,
}

/// The orchestrator's JSON-RPC client. Cheap to clone; clones share the
/// same collaborators and counters.
#[derive(Clone)]
pub struct RpcManager {
    inner: Arc<Inner>,
}

impl RpcManager {
    /// Creates a builder; see [`RpcManagerConfigBuilder`].
    pub fn builder() -> RpcManagerConfigBuilder {
        RpcManagerConfigBuilder::new()
    }

    /// `true` if the connection pool failed to construct at build time.
    /// Every call will fail immediately with [`RpcError::PoolExhausted`]
    /// until this manager is rebuilt with a working pool configuration.
    pub fn is_degraded(&self) -> bool {
        self.inner.degraded_pool
    }

    /// Coarse health for dashboards: [`TriggerHealth::Degraded`] if the
    /// connection pool is missing, [`TriggerHealth::Healthy`] otherwise.
    /// This manager never reports [`TriggerHealth::Unhealthy`] on its
    /// own — that judgment belongs to a caller combining this with its
    /// own liveness checks.
    pub fn health(&self) -> TriggerHealth {
        if self.inner.degraded_pool {
            TriggerHealth::Degraded
        } else {
            TriggerHealth::Healthy
        }
    }

    /// A point-in-time snapshot of call counters, latency percentiles, and
    /// every endpoint's health.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot(self.inner.selector.health_snapshot())
    }

    /// Issues one JSON-RPC call, running the full admission, caching,
    /// routing, and retry pipeline.
    pub async fn call(&self, method: impl Into<String>, params: Value, options: CallOptions) -> Result<Value, RpcError> {
        let method = method.into();
        let start = Instant::now();

        let attempt = self.call_with_cache(&method, params, &options);

        let outcome = match (options.timeout, options.cancellation.as_ref()) {
            (Some(timeout), Some(cancel)) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RpcError::Cancelled),
                    res = tokio::time::timeout(timeout, attempt) => res.unwrap_or(Err(RpcError::Timeout)),
                }
            }
            (Some(timeout), None) => tokio::time::timeout(timeout, attempt)
                .await
                .unwrap_or(Err(RpcError::Timeout)),
            (None, Some(cancel)) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RpcError::Cancelled),
                    res = attempt => res,
                }
            }
            (None, None) => attempt.await,
        };

        let duration = start.elapsed();
        self.inner.metrics.record_outcome(&outcome, duration);
        match &outcome {
            Ok(_) => self.inner.event_listeners.emit(&CallEvent::Completed {
                pattern_name: self.inner.name.clone(),
                timestamp: Instant::now(),
                method,
                duration,
            }),
            Err(e) => self.inner.event_listeners.emit(&CallEvent::Failed {
                pattern_name: self.inner.name.clone(),
                timestamp: Instant::now(),
                method,
                duration,
                error: e.to_string(),
            }),
        }

        outcome
    }

    async fn call_with_cache(&self, method: &str, params: Value, options: &CallOptions) -> Result<Value, RpcError> {
        let Some(cache) = self.inner.cache.as_ref().filter(|_| !options.skip_cache) else {
            return self.route(method, params, options).await;
        };

        let key = rpc_resilience_core::wire::canonical_params_key(method, &params);

        // The producer is handed to `coalesce` to run on its own detached
        // task (so our own timeout/cancellation never takes a coalescing
        // leader's producer down with it), so it has to own everything it
        // touches rather than borrow from this call.
        let this = self.clone();
        let owned_method = method.to_string();
        let owned_options = options.clone();
        cache
            .coalesce(&key, method, move || async move {
                this.route(&owned_method, params, &owned_options).await
            })
            .await
    }

    async fn route(&self, method: &str, params: Value, options: &CallOptions) -> Result<Value, RpcError> {
        if !options.skip_batch {
            if let Some(batch) = self.inner.batch.as_ref().filter(|b| b.is_batchable(method)) {
                return batch.enqueue(method.to_string(), params).await;
            }
        }

        if !options.skip_hedge && self.inner.hedgeable_methods.contains(method) {
            if let Some(hedge) = self.inner.hedge.as_ref() {
                return self.dispatch_hedged(method, params, hedge).await;
            }
        }

        self.dispatch_direct(method, params).await
    }

    async fn dispatch_direct(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut attempt = 0u32;
        loop {
            match self.attempt_once(method, &params, None).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.inner.retry.max_retries && e.is_infrastructure() => {
                    let delay = rpc_resilience_core::error::backoff_for_attempt(
                        self.inner.retry.base_delay,
                        attempt,
                        self.inner.retry.cap,
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn dispatch_direct_to_endpoint(&self, method: &str, params: Value, endpoint: EndpointHandle) -> Result<Value, RpcError> {
        let mut attempt = 0u32;
        loop {
            match self.attempt_once(method, &params, Some(endpoint.clone())).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.inner.retry.max_retries && e.is_infrastructure() => {
                    let delay = rpc_resilience_core::error::backoff_for_attempt(
                        self.inner.retry.base_delay,
                        attempt,
                        self.inner.retry.cap,
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn dispatch_hedged(&self, method: &str, params: Value, hedge: &HedgedManager) -> Result<Value, RpcError> {
        let Some((primary, backup)) = self.inner.selector.select_pair() else {
            return Err(RpcError::NoEndpoint);
        };

        let this = self.clone();
        let primary_method = method.to_string();
        let primary_params = params.clone();
        let primary_attempt: Attempt = Box::new(move || {
            let this = this.clone();
            let method = primary_method.clone();
            let params = primary_params.clone();
            let endpoint = primary.clone();
            Box::pin(async move { this.dispatch_direct_to_endpoint(&method, params, endpoint).await })
        });

        let backup_attempt: Option<Attempt> = backup.map(|endpoint| {
            let this = self.clone();
            let method = method.to_string();
            let params = params.clone();
            Box::new(move || {
                let this = this.clone();
                let method = method.clone();
                let params = params.clone();
                let endpoint = endpoint.clone();
                Box::pin(async move { this.dispatch_direct_to_endpoint(&method, params, endpoint).await })
                    as futures::future::BoxFuture<'static, Result<Value, RpcError>>
            }) as Attempt
        });

        hedge.run(primary_attempt, backup_attempt).await
    }

    /// Runs steps 1, 2, 6, 7, and 8 of the control flow once, for either
    /// the fixed endpoint a hedge attempt committed to, or a freshly
    /// selected one.
    async fn attempt_once(&self, method: &str, params: &Value, endpoint_override: Option<EndpointHandle>) -> Result<Value, RpcError> {
        if let Some(bucket) = &self.inner.bucket {
            if !bucket.try_consume(1) {
                return Err(RpcError::RateLimited);
            }
        }
        if let Some(breaker) = &self.inner.breaker {
            if !breaker.allow() {
                return Err(RpcError::CircuitOpen);
            }
        }

        let endpoint = match endpoint_override {
            Some(endpoint) => endpoint,
            None => self.inner.selector.select().ok_or(RpcError::NoEndpoint)?,
        };

        let start = Instant::now();
        let outcome = self.send_one(&endpoint, method, params).await;
        self.record_outcome(&endpoint, &outcome, start.elapsed());
        outcome
    }

    async fn send_one(&self, endpoint: &EndpointHandle, method: &str, params: &Value) -> Result<Value, RpcError> {
        let Some(pool) = &self.inner.pool else {
            return Err(RpcError::PoolExhausted);
        };
        let host = dispatch::host_of(&endpoint.url);
        let permit = pool.acquire(&host).await.map_err(|_| RpcError::PoolExhausted)?;
        let request = JsonRpcRequest::new(0, method.to_string(), params.clone());
        dispatch::send_single(permit.client(), &endpoint.url, request, self.inner.request_timeout).await
    }

    fn record_outcome(&self, endpoint: &EndpointHandle, outcome: &Result<Value, RpcError>, duration: Duration) {
        if let Some(breaker) = &self.inner.breaker {
            breaker.record_result(outcome, duration);
        }
        let failed = outcome.as_ref().err().is_some_and(RpcError::counts_as_breaker_failure);
        if failed {
            self.inner.selector.record_failure(endpoint.id);
        } else {
            self.inner.selector.record_success(endpoint.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jsonrpc_ok(id: u64, result: serde_json::Value) -> serde_json::Value {
        serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result})
    }

    #[tokio::test]
    async fn direct_call_round_trips_through_a_real_http_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jsonrpc_ok(0, serde_json::json!(42))))
            .mount(&server)
            .await;

        let manager = RpcManager::builder()
            .endpoint(server.uri())
            .without_cache()
            .without_batching()
            .without_hedging()
            .build();

        let result = manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
        assert_eq!(result.unwrap(), serde_json::json!(42));
    }

    #[tokio::test]
    async fn rate_limiter_saturation_rejects_without_reaching_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jsonrpc_ok(0, serde_json::json!(1))))
            .mount(&server)
            .await;

        let manager = RpcManager::builder()
            .endpoint(server.uri())
            .rate_limit(1.0, 0.0)
            .without_cache()
            .without_batching()
            .without_hedging()
            .build();

        let first = manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
        assert!(first.is_ok());
        let second = manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
        assert!(matches!(second, Err(RpcError::RateLimited)));
    }

    #[tokio::test]
    async fn circuit_trips_after_threshold_and_recovers_after_cooldown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(10)
            .mount(&server)
            .await;

        let manager = RpcManager::builder()
            .endpoint(server.uri())
            .without_cache()
            .without_batching()
            .without_hedging()
            .max_retries(0)
            .circuit_breaker(0.5, 4)
            .build();

        for _ in 0..4 {
            let _ = manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
        }

        let tripped = manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
        assert!(matches!(tripped, Err(RpcError::CircuitOpen)));
    }

    #[tokio::test]
    async fn pool_exhaustion_fails_fast_without_waiting() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jsonrpc_ok(0, serde_json::json!(1))).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let manager = RpcManager::builder()
            .endpoint(server.uri())
            .pool_limits(1, 1)
            .without_cache()
            .without_batching()
            .without_hedging()
            .max_retries(0)
            .build();

        let held = manager.clone();
        let holder = tokio::spawn(async move {
            let _ = held.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
        assert!(matches!(second, Err(RpcError::PoolExhausted)));
        holder.abort();
    }

    #[tokio::test]
    async fn cache_coalesces_concurrent_identical_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/")).respond_with(move |_req: &wiremock::Request| {
            ResponseTemplate::new(200).set_body_json(jsonrpc_ok(0, serde_json::json!(7)))
        }).mount(&server).await;
        let _ = &calls;

        let manager = RpcManager::builder()
            .endpoint(server.uri())
            .without_batching()
            .without_hedging()
            .build();

        let a = manager.clone();
        let b = manager.clone();
        let (r1, r2) = tokio::join!(
            a.call("getBalance", serde_json::json!(["X"]), CallOptions::default()),
            b.call("getBalance", serde_json::json!(["X"]), CallOptions::default()),
        );
        assert_eq!(r1.unwrap(), serde_json::json!(7));
        assert_eq!(r2.unwrap(), serde_json::json!(7));
    }

    #[tokio::test]
    async fn batchable_calls_are_coalesced_into_one_wire_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/")).respond_with(|req: &wiremock::Request| {
            let body: Vec<serde_json::Value> = req.body_json().unwrap();
            let responses: Vec<serde_json::Value> = body
                .iter()
                .map(|r| jsonrpc_ok(r["id"].as_u64().unwrap(), r["id"].clone()))
                .collect();
            ResponseTemplate::new(200).set_body_json(responses)
        }).mount(&server).await;

        let manager = RpcManager::builder()
            .endpoint(server.uri())
            .without_cache()
            .without_hedging()
            .batchable_method("getBalance")
            .batch_trigger(3, Duration::from_secs(60))
            .build();

        let a = manager.clone();
        let b = manager.clone();
        let c = manager.clone();
        let (r1, r2, r3) = tokio::join!(
            a.call("getBalance", serde_json::json!(["A"]), CallOptions::default()),
            b.call("getBalance", serde_json::json!(["B"]), CallOptions::default()),
            c.call("getBalance", serde_json::json!(["C"]), CallOptions::default()),
        );
        assert!(r1.is_ok());
        assert!(r2.is_ok());
        assert!(r3.is_ok());
    }

    #[tokio::test]
    async fn timeout_option_bounds_the_whole_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jsonrpc_ok(0, serde_json::json!(1))).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let manager = RpcManager::builder()
            .endpoint(server.uri())
            .without_cache()
            .without_batching()
            .without_hedging()
            .max_retries(0)
            .build();

        let options = CallOptions::builder().timeout(Duration::from_millis(100)).build();
        let result = manager.call("getSlot", serde_json::json!([]), options).await;
        assert!(matches!(result, Err(RpcError::Timeout)));
    }

    #[tokio::test]
    async fn cancellation_signal_aborts_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jsonrpc_ok(0, serde_json::json!(1))).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let manager = RpcManager::builder()
            .endpoint(server.uri())
            .without_cache()
            .without_batching()
            .without_hedging()
            .max_retries(0)
            .build();

        let signal = CancellationSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.trigger();
        });

        let options = CallOptions::builder().cancellation(signal).build();
        let result = manager.call("getSlot", serde_json::json!([]), options).await;
        assert!(matches!(result, Err(RpcError::Cancelled)));
    }

    #[tokio::test]
    async fn a_manager_with_no_endpoints_configured_panics_at_build() {
        let result = std::panic::catch_unwind(|| {
            RpcManager::builder().build();
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn metrics_snapshot_reflects_call_outcomes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jsonrpc_ok(0, serde_json::json!(1))))
            .mount(&server)
            .await;

        let manager = RpcManager::builder()
            .endpoint(server.uri())
            .without_cache()
            .without_batching()
            .without_hedging()
            .build();

        let _ = manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
        let snapshot = manager.metrics();
        assert_eq!(snapshot.total_calls, 1);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.endpoint_health.len(), 1);
    }
}
