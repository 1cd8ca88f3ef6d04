//! The actual wire send: one JSON-RPC request or one JSON-RPC batch array,
//! over a pooled HTTP connection.
//!
//! Nothing in this module knows about retries, admission, or routing — it
//! is the one place that calls `reqwest` directly. Everything above it
//! (the direct/hedged dispatch loops in [`crate::RpcManager`], and the
//! batch dispatcher closure built here for [`rpc_resilience_batch`]) treats
//! it as an opaque "send these requests, get these responses or an error"
//! step.

use crate::config::RetryConfig;
use rpc_resilience_batch::Dispatcher as BatchDispatcher;
use rpc_resilience_circuitbreaker::CircuitBreaker;
use rpc_resilience_core::error::backoff_for_attempt;
use rpc_resilience_core::wire::{JsonRpcRequest, JsonRpcResponse};
use rpc_resilience_core::RpcError;
use rpc_resilience_endpoint::EndpointSelector;
use rpc_resilience_pool::ConnectionPool;
use rpc_resilience_tokenbucket::TokenBucket;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Extracts the host `reqwest`'s connection pool keys on, from a full
/// endpoint URL. Falls back to the whole URL if it doesn't parse, so a
/// malformed endpoint still gets a (degenerate, unshared) pool slot rather
/// than panicking.
pub(crate) fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// Sends one JSON-RPC request and decodes its single-object response.
pub(crate) async fn send_single(
    client: &reqwest::Client,
    url: &str,
    request: JsonRpcRequest,
    timeout: Duration,
) -> Result<Value, RpcError> {
    let response = client
        .post(url)
        .json(&request)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| RpcError::infrastructure(e.to_string()))?;

    if !response.status().is_success() {
        return Err(RpcError::infrastructure(format!(
            "upstream returned HTTP {}",
            response.status()
        )));
    }

    let body: JsonRpcResponse = response
        .json()
        .await
        .map_err(|e| RpcError::infrastructure(format!("malformed JSON-RPC envelope: {e}")))?;

    if let Some(error) = body.error {
        return Err(RpcError::Application {
            code: error.code,
            message: error.message,
        });
    }

    body.result
        .ok_or_else(|| RpcError::infrastructure("response had neither a result nor an error"))
}

/// Sends one JSON-RPC batch request (a JSON array body) and decodes the
/// upstream's array of responses. Per-slot success/failure is the batch
/// manager's job; this just gets the array onto and off the wire.
pub(crate) async fn send_batch(
    client: &reqwest::Client,
    url: &str,
    requests: Vec<JsonRpcRequest>,
    timeout: Duration,
) -> Result<Vec<JsonRpcResponse>, RpcError> {
    let response = client
        .post(url)
        .json(&requests)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| RpcError::infrastructure(e.to_string()))?;

    if !response.status().is_success() {
        return Err(RpcError::infrastructure(format!(
            "upstream returned HTTP {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| RpcError::infrastructure(format!("malformed JSON-RPC batch envelope: {e}")))
}

/// Builds the [`BatchDispatcher`] closure handed to
/// [`rpc_resilience_batch::BatchManager`] at construction time.
///
/// Captures clones of the orchestrator's admission, breaker, pool, and
/// selector handles directly, rather than a handle back to the orchestrator
/// itself — the batch crate has no notion of an `RpcManager` and never
/// will, so the dependency only runs one way.
pub(crate) fn build_batch_dispatcher(
    bucket: Option<TokenBucket>,
    breaker: Option<CircuitBreaker>,
    pool: Option<Arc<ConnectionPool>>,
    selector: EndpointSelector,
    retry: RetryConfig,
    request_timeout: Duration,
) -> BatchDispatcher {
    Arc::new(move |requests: Vec<JsonRpcRequest>| {
        let bucket = bucket.clone();
        let breaker = breaker.clone();
        let pool = pool.clone();
        let selector = selector.clone();
        let retry = retry.clone();
        Box::pin(async move {
            let mut attempt = 0u32;
            loop {
                if let Some(bucket) = &bucket {
                    if !bucket.try_consume(1) {
                        return Err(RpcError::RateLimited);
                    }
                }
                if let Some(breaker) = &breaker {
                    if !breaker.allow() {
                        return Err(RpcError::CircuitOpen);
                    }
                }
                let Some(endpoint) = selector.select() else {
                    return Err(RpcError::NoEndpoint);
                };
                let Some(pool) = &pool else {
                    selector.record_failure(endpoint.id);
                    return Err(RpcError::PoolExhausted);
                };

                let host = host_of(&endpoint.url);
                let start = Instant::now();
                let outcome = match pool.acquire(&host).await {
                    Ok(permit) => {
                        send_batch(permit.client(), &endpoint.url, requests.clone(), request_timeout).await
                    }
                    Err(_) => Err(RpcError::PoolExhausted),
                };

                if let Some(breaker) = &breaker {
                    breaker.record_result(&outcome, start.elapsed());
                }
                if outcome.as_ref().err().is_some_and(RpcError::counts_as_breaker_failure) {
                    selector.record_failure(endpoint.id);
                } else {
                    selector.record_success(endpoint.id);
                }

                match outcome {
                    Ok(responses) => return Ok(responses),
                    Err(e) if attempt < retry.max_retries && e.is_infrastructure() => {
                        let delay = backoff_for_attempt(retry.base_delay, attempt, retry.cap);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    })
}
