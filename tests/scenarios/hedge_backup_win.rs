//! Hedge delay 200ms against two distinct endpoints. The primary stalls
//! for a full second; the backup, dispatched after the delay, answers in
//! 50ms. The call resolves around the 250ms mark with the backup's
//! value, and the endpoint-diversity invariant (primary != backup) holds.

use rpc_resilience_manager::{CallOptions, RpcManager};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn backup_wins_the_race_against_a_stalled_primary() {
    let primary_server = MockServer::start().await;
    let backup_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"jsonrpc": "2.0", "id": 0, "result": "from-primary"}))
                .set_delay(Duration::from_secs(1)),
        )
        .mount(&primary_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"jsonrpc": "2.0", "id": 0, "result": "from-backup"}))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&backup_server)
        .await;

    let manager = RpcManager::builder()
        .endpoint(primary_server.uri())
        .endpoint(backup_server.uri())
        .without_cache()
        .without_batching()
        .hedgeable_method("getSlot")
        .hedge_delay(Duration::from_millis(200))
        .max_retries(0)
        .build();

    let start = Instant::now();
    let result = manager.call("getSlot", serde_json::json!([]), CallOptions::default()).await;
    let elapsed = start.elapsed();

    assert_eq!(result.unwrap(), serde_json::json!("from-backup"));
    assert!(elapsed >= Duration::from_millis(200), "shouldn't resolve before the backup even fires ({elapsed:?})");
    assert!(elapsed < Duration::from_millis(900), "the stalled primary must not be waited out ({elapsed:?})");

    let snapshot = manager.metrics();
    assert_eq!(snapshot.hedge_backup_wins, 1);
    assert_eq!(snapshot.hedge_primary_wins, 0);
}
