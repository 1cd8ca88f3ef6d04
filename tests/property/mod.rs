pub mod cache_round_trip;
pub mod manager_call_outcomes;
pub mod token_bucket;
