//! 100 concurrent calls to `getTokenSupply("X")`: exactly one upstream
//! request fires, all 100 callers resolve to the same value, and the
//! coalesced-hit counter reads 99 (one leader, ninety-nine waiters).

use rpc_resilience_manager::{CallOptions, RpcManager};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn concurrent_identical_calls_share_one_upstream_request() {
    let server = MockServer::start().await;
    let upstream_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&upstream_calls);
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(move |_req: &wiremock::Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"jsonrpc": "2.0", "id": 0, "result": 987_654_321u64}))
        })
        .mount(&server)
        .await;

    let manager = RpcManager::builder()
        .endpoint(server.uri())
        .without_batching()
        .without_hedging()
        .build();

    let results = futures::future::join_all((0..100).map(|_| {
        let manager = manager.clone();
        async move { manager.call("getTokenSupply", serde_json::json!(["X"]), CallOptions::default()).await }
    }))
    .await;

    assert_eq!(upstream_calls.load(Ordering::SeqCst), 1, "only the leader should reach the network");
    for result in results {
        assert_eq!(result.unwrap(), serde_json::json!(987_654_321u64));
    }

    let snapshot = manager.metrics();
    assert_eq!(snapshot.cache_coalesced, 99, "ninety-nine waiters should have joined the leader's future");
}
