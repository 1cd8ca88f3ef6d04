//! Property: for all sequences of calls through the orchestrator,
//! `succeeded + failed == total`. No call is ever double-counted or
//! dropped silently, regardless of how many of them hit a failing
//! upstream or get rate-limited at the door.

use proptest::prelude::*;
use rpc_resilience_manager::{CallOptions, RpcManager};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn successful_plus_failed_always_equals_total(call_count in 1usize..40) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let server = MockServer::start().await;
            let seen = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&seen);
            Mock::given(method("POST")).and(path("/")).respond_with(move |_req: &wiremock::Request| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n % 3 == 0 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({"jsonrpc": "2.0", "id": 0, "result": n}))
                }
            }).mount(&server).await;

            let manager = RpcManager::builder()
                .endpoint(server.uri())
                .without_cache()
                .without_batching()
                .without_hedging()
                .max_retries(0)
                .build();

            for _ in 0..call_count {
                let _ = manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
            }

            let snapshot = manager.metrics();
            let failed = snapshot.rate_limited
                + snapshot.circuit_open
                + snapshot.no_endpoint
                + snapshot.pool_exhausted
                + snapshot.timed_out
                + snapshot.cancelled
                + snapshot.infrastructure
                + snapshot.application
                + snapshot.batch_response_missing
                + snapshot.batch_queue_full;

            prop_assert_eq!(snapshot.total_calls, call_count as u64);
            prop_assert_eq!(snapshot.succeeded + failed, snapshot.total_calls);
            Ok(())
        })?;
    }
}
