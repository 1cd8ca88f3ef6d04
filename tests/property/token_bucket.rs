//! Property: for all bucket states, `0 <= tokens <= capacity`, and a
//! `try_consume` either takes exactly `n` tokens or takes none at all.

use proptest::prelude::*;
use rpc_resilience_tokenbucket::TokenBucket;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn tokens_never_leave_the_0_to_capacity_range(
        capacity in 1.0f64..500.0,
        draws in prop::collection::vec(1u32..=5, 0..200),
    ) {
        // refill_rate 0 so the whole sequence runs as pure consumption,
        // independent of wall-clock timing.
        let bucket = TokenBucket::builder().capacity(capacity).refill_rate(0.0).build();

        for n in draws {
            let before = bucket.available();
            let admitted = bucket.try_consume(n);
            let after = bucket.available();

            prop_assert!(after >= 0.0, "tokens must never go negative");
            prop_assert!(after <= capacity + f64::EPSILON, "tokens must never exceed capacity");

            if admitted {
                prop_assert!((before - after - n as f64).abs() < 1e-9, "an admitted draw must take exactly n tokens");
            } else {
                prop_assert!((before - after).abs() < 1e-9, "a rejected draw must take nothing at all");
            }
        }
    }

    #[test]
    fn a_fully_drained_bucket_never_admits_another_draw(capacity in 1.0f64..200.0) {
        let bucket = TokenBucket::builder().capacity(capacity).refill_rate(0.0).build();
        let whole = capacity.floor() as u32;
        if whole > 0 {
            prop_assert!(bucket.try_consume(whole));
        }
        prop_assert!(!bucket.try_consume(1), "no refill means no further admission");
        prop_assert!(bucket.available() < 1.0);
    }
}
