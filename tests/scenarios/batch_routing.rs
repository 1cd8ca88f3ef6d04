//! Batch size 8, window 100ms, `getBalance` batchable. Five calls with
//! distinct params land within 10ms of each other; the upstream answers
//! with the responses in reverse order. Each caller must still get back
//! the value that matches its own request.

use rpc_resilience_manager::{CallOptions, RpcManager};
use serde_json::Value;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn reversed_batch_response(req: &Request) -> ResponseTemplate {
    let body: Vec<Value> = req.body_json().expect("batch body is a JSON array");
    let mut responses: Vec<Value> = body
        .iter()
        .map(|slot| {
            let id = slot["id"].as_u64().expect("each slot carries an id");
            let echoed = slot["params"][0].clone();
            serde_json::json!({"jsonrpc": "2.0", "id": id, "result": echoed})
        })
        .collect();
    responses.reverse();
    ResponseTemplate::new(200).set_body_json(responses)
}

#[tokio::test]
async fn five_calls_flush_as_one_batch_and_route_by_id_not_position() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/")).respond_with(reversed_batch_response).mount(&server).await;

    let manager = RpcManager::builder()
        .endpoint(server.uri())
        .without_cache()
        .without_hedging()
        .batchable_method("getBalance")
        .batch_trigger(8, Duration::from_millis(100))
        .build();

    let params = ["A", "B", "C", "D", "E"];
    let start = Instant::now();
    let results = futures::future::join_all(params.iter().map(|p| {
        let manager = manager.clone();
        let param = serde_json::json!([p]);
        async move { manager.call("getBalance", param, CallOptions::default()).await }
    }))
    .await;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(90), "five slots shouldn't flush before the window ({elapsed:?})");
    assert!(elapsed < Duration::from_secs(2), "the window flush shouldn't be this late ({elapsed:?})");

    for (expected, result) in params.iter().zip(results) {
        assert_eq!(result.unwrap(), serde_json::json!(expected), "each caller must see its own echoed param, not a sibling's");
    }

    let snapshot = manager.metrics();
    assert_eq!(snapshot.batch_flushes, 1, "all five slots should share a single flush");
    assert_eq!(snapshot.batch_slots, 5);
}
