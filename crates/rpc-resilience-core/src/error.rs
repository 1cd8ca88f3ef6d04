//! The unified error taxonomy surfaced to callers of [`RpcManager`](https://docs.rs/rpc-resilience-manager).
//!
//! Every component crate in this workspace has its own local error type
//! (`TokenBucketError`, `CircuitBreakerError`, `PoolError`, ...). The
//! orchestrator is the one place allowed to know about all of them, and it
//! converts each into the matching [`RpcError`] variant at the call
//! boundary. Application code only ever sees `RpcError`.

use std::time::Duration;

/// Error returned by [`RpcManager::call`](https://docs.rs/rpc-resilience-manager).
///
/// Exactly one variant is produced per call: infrastructure errors are
/// retried internally up to the configured limit before ever reaching the
/// caller, so by the time a caller observes `Infrastructure` the retry
/// budget has already been spent.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    /// The token bucket had no tokens available for this call.
    #[error("rate limited")]
    RateLimited,

    /// The circuit breaker is open, or half-open and already at its probe
    /// capacity.
    #[error("circuit open")]
    CircuitOpen,

    /// Every endpoint is quarantined and none is eligible for a recovery
    /// probe yet.
    #[error("no endpoint available")]
    NoEndpoint,

    /// The connection pool has no socket available for the selected host.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// The caller-supplied timeout elapsed before the call resolved.
    #[error("call timed out")]
    Timeout,

    /// The caller's cancellation signal fired before the call resolved.
    #[error("call cancelled")]
    Cancelled,

    /// A DNS, connect, TLS, TCP, or 5xx failure, or a malformed JSON-RPC
    /// envelope. Retried internally up to `max_retries` before being
    /// surfaced; this variant means the retry budget was exhausted.
    #[error("infrastructure error: {message}")]
    Infrastructure {
        /// Human-readable detail; not parsed, for logging only.
        message: String,
    },

    /// The upstream returned a well-formed JSON-RPC error envelope. Never
    /// retried and never counted against the circuit breaker.
    #[error("application error {code}: {message}")]
    Application {
        /// The JSON-RPC error object's `code` field.
        code: i64,
        /// The JSON-RPC error object's `message` field.
        message: String,
    },

    /// A batch slot resolved with no matching response `id` in the
    /// upstream's array reply.
    #[error("batch response missing for this slot")]
    BatchResponseMissing,

    /// The batch manager's pending queue was at `max_queue_size`; the
    /// caller should fall back to direct dispatch.
    #[error("batch queue full")]
    BatchQueueFull,
}

impl RpcError {
    /// Returns `true` for the one kind that the orchestrator retries
    /// internally with backoff.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, RpcError::Infrastructure { .. })
    }

    /// Returns `true` if this error should count as a circuit-breaker
    /// failure and an endpoint-health failure.
    ///
    /// Mirrors §7 of the transport spec: only infrastructure failures
    /// trip the breaker or quarantine an endpoint. Admission, cache, and
    /// application-level outcomes never do.
    pub fn counts_as_breaker_failure(&self) -> bool {
        matches!(self, RpcError::Infrastructure { .. } | RpcError::PoolExhausted)
    }

    pub(crate) fn infrastructure(message: impl Into<String>) -> Self {
        RpcError::Infrastructure {
            message: message.into(),
        }
    }
}

/// Backoff schedule shared by the orchestrator's retry loop.
///
/// `base * 1.5^attempt`, jittered by up to 20% and capped at 60s, matching
/// §4.8 of the transport spec. Grounded on the same shape the teacher
/// crate uses for its exponential retry backoff
/// (`tower-resilience-retry::ExponentialRandomBackoff`), reimplemented
/// here so it can be shared between the manager's retry loop and the
/// hedge manager's optional adaptive delay without a dependency on the
/// removed retry crate.
pub fn backoff_for_attempt(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 1.5f64.powi(attempt as i32);
    let raw = base.mul_f64(factor).min(cap);
    let jitter = rand::random::<f64>() * 0.2 - 0.1;
    let jittered = raw.mul_f64(1.0 + jitter);
    jittered.min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_counts_as_failure() {
        let err = RpcError::infrastructure("connection refused");
        assert!(err.is_infrastructure());
        assert!(err.counts_as_breaker_failure());
    }

    #[test]
    fn application_error_does_not_count_as_failure() {
        let err = RpcError::Application {
            code: -32602,
            message: "invalid params".into(),
        };
        assert!(!err.is_infrastructure());
        assert!(!err.counts_as_breaker_failure());
    }

    #[test]
    fn pool_exhausted_counts_as_breaker_failure_but_is_not_infrastructure() {
        let err = RpcError::PoolExhausted;
        assert!(!err.is_infrastructure());
        assert!(err.counts_as_breaker_failure());
    }

    #[test]
    fn backoff_is_capped() {
        let cap = Duration::from_secs(60);
        let d = backoff_for_attempt(Duration::from_millis(100), 20, cap);
        assert!(d <= cap);
    }

    #[test]
    fn backoff_grows_with_attempt() {
        let cap = Duration::from_secs(60);
        let base = Duration::from_millis(100);
        // Compare the unjittered midpoints to avoid flakiness from jitter.
        let low = base.mul_f64(1.5f64.powi(0));
        let high = base.mul_f64(1.5f64.powi(3));
        assert!(low < high);
        let _ = backoff_for_attempt(base, 3, cap);
    }
}
