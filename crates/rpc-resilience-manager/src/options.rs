//! Per-call options accepted by [`crate::RpcManager::call`].

use crate::cancellation::CancellationSignal;
use std::time::Duration;

/// Per-call overrides of the orchestrator's default behavior.
///
/// `CallOptions::default()` takes every default: no deadline, no
/// cancellation signal, and cache/batch/hedge routing all left enabled as
/// configured on the manager.
#[derive(Clone, Default)]
pub struct CallOptions {
    pub(crate) timeout: Option<Duration>,
    pub(crate) cancellation: Option<CancellationSignal>,
    pub(crate) skip_cache: bool,
    pub(crate) skip_batch: bool,
    pub(crate) skip_hedge: bool,
}

impl CallOptions {
    /// Creates a builder with every option at its default.
    pub fn builder() -> CallOptionsBuilder {
        CallOptionsBuilder::default()
    }
}

/// Builder for [`CallOptions`].
#[derive(Clone, Default)]
pub struct CallOptionsBuilder {
    options: CallOptions,
}

impl CallOptionsBuilder {
    /// Fails the call with [`rpc_resilience_core::RpcError::Timeout`] if it
    /// has not resolved within `duration`, including time spent waiting on
    /// retries and backoff.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.options.timeout = Some(duration);
        self
    }

    /// Races the call against `signal`; if `signal` fires first, the call
    /// fails with [`rpc_resilience_core::RpcError::Cancelled`].
    pub fn cancellation(mut self, signal: CancellationSignal) -> Self {
        self.options.cancellation = Some(signal);
        self
    }

    /// Bypasses the response cache for this call, even if the method has a
    /// configured TTL.
    pub fn skip_cache(mut self) -> Self {
        self.options.skip_cache = true;
        self
    }

    /// Bypasses batch coalescing for this call, even if the method is on
    /// the batchable whitelist.
    pub fn skip_batch(mut self) -> Self {
        self.options.skip_batch = true;
        self
    }

    /// Bypasses hedged dispatch for this call, even if the method is on the
    /// hedgeable whitelist.
    pub fn skip_hedge(mut self) -> Self {
        self.options.skip_hedge = true;
        self
    }

    /// Builds the [`CallOptions`].
    pub fn build(self) -> CallOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_skip_nothing() {
        let options = CallOptions::default();
        assert!(options.timeout.is_none());
        assert!(options.cancellation.is_none());
        assert!(!options.skip_cache);
        assert!(!options.skip_batch);
        assert!(!options.skip_hedge);
    }

    #[test]
    fn builder_sets_requested_overrides() {
        let signal = CancellationSignal::new();
        let options = CallOptions::builder()
            .timeout(Duration::from_millis(500))
            .cancellation(signal)
            .skip_cache()
            .build();
        assert_eq!(options.timeout, Some(Duration::from_millis(500)));
        assert!(options.cancellation.is_some());
        assert!(options.skip_cache);
        assert!(!options.skip_batch);
    }
}
