//! Round-trip property: `set(k, v, ttl); get(k) == v` while the ttl has
//! not elapsed, and `get(k) == Miss` once it has.

use proptest::prelude::*;
use rpc_resilience_cache::RequestCache;
use std::time::Duration;
use tokio::runtime::Runtime;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn a_value_survives_until_its_ttl_and_not_a_moment_longer(
        value in any::<i64>(),
        ttl_millis in 30u64..80,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let cache = RequestCache::builder().max_size(16).default_ttl(Duration::from_secs(30)).build();
            cache.set("k", serde_json::json!(value), Duration::from_millis(ttl_millis));

            prop_assert_eq!(cache.get("k"), Some(serde_json::json!(value)));

            tokio::time::sleep(Duration::from_millis(ttl_millis) + Duration::from_millis(40)).await;
            prop_assert_eq!(cache.get("k"), None);
            Ok(())
        })?;
    }
}
