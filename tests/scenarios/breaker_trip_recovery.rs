//! Threshold 6 (of a 6-call window), cooldown 500ms, half-open probe count
//! 3. Calls 1-6 fail with an infrastructure error and trip the breaker;
//! calls 7-10 fail fast with `CIRCUIT_OPEN`. After the cooldown, three
//! consecutive successful probes close the circuit again.

use rpc_resilience_manager::{CallOptions, RpcError, RpcManager};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn trips_after_six_failures_and_recovers_after_three_probes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(6)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"jsonrpc": "2.0", "id": 0, "result": 1})))
        .mount(&server)
        .await;

    let manager = RpcManager::builder()
        .endpoint(server.uri())
        .without_cache()
        .without_batching()
        .without_hedging()
        .max_retries(0)
        .circuit_breaker(1.0, 6)
        .circuit_breaker_recovery(Duration::from_millis(500), 3)
        .build();

    let mut outcomes = Vec::new();
    for _ in 0..10 {
        outcomes.push(manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await);
    }

    for outcome in &outcomes[..6] {
        assert!(matches!(outcome, Err(RpcError::Infrastructure { .. })), "first six calls should see the real 500s");
    }
    for outcome in &outcomes[6..] {
        assert!(matches!(outcome, Err(RpcError::CircuitOpen)), "the breaker should fail fast once tripped");
    }

    tokio::time::sleep(Duration::from_millis(550)).await;

    for _ in 0..3 {
        let probe = manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
        assert!(probe.is_ok(), "half-open probes should reach the now-healthy upstream");
    }

    let closed = manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
    assert!(closed.is_ok(), "the circuit should be closed and admitting freely again");

    let snapshot = manager.metrics();
    assert!(snapshot.breaker_transitions >= 3, "closed->open, open->half-open, half-open->closed");
}
