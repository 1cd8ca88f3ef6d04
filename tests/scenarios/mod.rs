//! One module per literal end-to-end scenario, each an independent
//! `wiremock` server plus a purpose-built [`RpcManager`].

mod batch_routing;
mod breaker_trip_recovery;
mod cache_coalescing;
mod hedge_backup_win;
mod pool_exhaustion;
mod rate_limit_saturation;

pub(crate) mod support;
