//! Bucket capacity 50, rate 50/s. 100 concurrent `getSlot` calls land at
//! once: exactly 50 succeed, 50 fail `RATE_LIMITED`. A second later,
//! another 50 all succeed once the bucket has refilled.

use super::support::jsonrpc_ok;
use rpc_resilience_manager::{CallOptions, RpcError, RpcManager};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn saturates_at_capacity_then_refills_after_one_second() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jsonrpc_ok(0, serde_json::json!(12345))))
        .mount(&server)
        .await;

    let manager = RpcManager::builder()
        .endpoint(server.uri())
        .rate_limit(50.0, 50.0)
        .without_cache()
        .without_batching()
        .without_hedging()
        .max_retries(0)
        .build();

    let first_wave = futures::future::join_all((0..100).map(|_| {
        let manager = manager.clone();
        async move { manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await }
    }))
    .await;

    let succeeded = first_wave.iter().filter(|r| r.is_ok()).count();
    let rate_limited = first_wave.iter().filter(|r| matches!(r, Err(RpcError::RateLimited))).count();
    assert_eq!(succeeded, 50, "exactly half the first wave should be admitted");
    assert_eq!(rate_limited, 50, "the rest should be rejected for lack of tokens");

    tokio::time::sleep(Duration::from_millis(1050)).await;

    let second_wave = futures::future::join_all((0..50).map(|_| {
        let manager = manager.clone();
        async move { manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await }
    }))
    .await;

    assert!(second_wave.iter().all(|r| r.is_ok()), "a full bucket after refill admits all 50");
}
