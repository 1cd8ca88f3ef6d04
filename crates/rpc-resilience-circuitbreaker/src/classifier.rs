//! Failure classification for circuit breaker decisions.

use rpc_resilience_core::RpcError;
use std::sync::Arc;

/// A classifier decides whether a given `RpcError` should count toward the
/// breaker's failure rate. Application-level JSON-RPC errors never count;
/// infrastructure failures and pool exhaustion always do, by default.
pub type Classifier = dyn Fn(&RpcError) -> bool + Send + Sync;
pub type SharedClassifier = Arc<Classifier>;

/// Default classifier: mirrors [`RpcError::counts_as_breaker_failure`].
pub fn default_classifier() -> SharedClassifier {
    Arc::new(RpcError::counts_as_breaker_failure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_classifier_matches_rpc_error_semantics() {
        let classifier = default_classifier();
        assert!(classifier(&RpcError::Infrastructure {
            message: "boom".into(),
        }));
        assert!(!classifier(&RpcError::Application {
            code: -32602,
            message: "bad params".into(),
        }));
    }
}
