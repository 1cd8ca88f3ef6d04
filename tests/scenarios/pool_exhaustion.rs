//! Max-sockets 1. While one call holds the only socket, five more land;
//! all five fail fast with `POOL_EXHAUSTED` rather than queueing, and the
//! holder's completion releases the socket for whatever comes next.

use rpc_resilience_manager::{CallOptions, RpcError, RpcManager};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn five_extra_calls_fail_fast_while_the_only_socket_is_held() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"jsonrpc": "2.0", "id": 0, "result": 1}))
                .set_delay(Duration::from_secs(5)),
        )
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

    let holder = manager.clone();
    let held_call = tokio::spawn(async move { holder.call("getSlot", serde_json::json!([]), CallOptions::default()).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let extra = futures::future::join_all((0..5).map(|_| {
        let manager = manager.clone();
        async move { manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await }
    }))
    .await;

    for result in &extra {
        assert!(matches!(result, Err(RpcError::PoolExhausted)), "no spare socket should mean an immediate failure, not a wait");
    }

    let snapshot = manager.metrics();
    assert_eq!(snapshot.pool_exhausted, 5, "every exhaustion should be counted toward breaker-relevant failures");

    held_call.abort();
}
