//! In-process metrics snapshot.
//!
//! Each component crate emits its own Prometheus series when built with its
//! `metrics` feature; this module additionally keeps a small set of atomics
//! and a bounded latency sample window so a caller can pull a point-in-time
//! [`MetricsSnapshot`] without scraping `/metrics` (useful for health
//! endpoints, admin CLIs, and tests). The latency percentile calculation
//! mirrors the hedge manager's adaptive-delay sampler: a capped
//! `VecDeque`, sorted on read.

use rpc_resilience_endpoint::EndpointHealth;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const LATENCY_SAMPLE_WINDOW: usize = 1000;

/// Counters and latency samples accumulated across every
/// [`crate::RpcManager::call`] invocation.
pub(crate) struct Metrics {
    total: AtomicU64,
    succeeded: AtomicU64,
    rate_limited: AtomicU64,
    circuit_open: AtomicU64,
    no_endpoint: AtomicU64,
    pool_exhausted: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    infrastructure: AtomicU64,
    application: AtomicU64,
    batch_response_missing: AtomicU64,
    batch_queue_full: AtomicU64,
    latencies: Mutex<VecDeque<Duration>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_coalesced: AtomicU64,
    batch_slots: AtomicU64,
    batch_flushes: AtomicU64,
    hedge_primary_wins: AtomicU64,
    hedge_backup_wins: AtomicU64,
    hedge_all_failed: AtomicU64,
    breaker_transitions: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            circuit_open: AtomicU64::new(0),
            no_endpoint: AtomicU64::new(0),
            pool_exhausted: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            infrastructure: AtomicU64::new(0),
            application: AtomicU64::new(0),
            batch_response_missing: AtomicU64::new(0),
            batch_queue_full: AtomicU64::new(0),
            latencies: Mutex::new(VecDeque::with_capacity(LATENCY_SAMPLE_WINDOW)),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_coalesced: AtomicU64::new(0),
            batch_slots: AtomicU64::new(0),
            batch_flushes: AtomicU64::new(0),
            hedge_primary_wins: AtomicU64::new(0),
            hedge_backup_wins: AtomicU64::new(0),
            hedge_all_failed: AtomicU64::new(0),
            breaker_transitions: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_outcome(&self, outcome: &Result<serde_json::Value, rpc_resilience_core::RpcError>, duration: Duration) {
        use rpc_resilience_core::RpcError;

        self.total.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Ok(_) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(RpcError::RateLimited) => {
                self.rate_limited.fetch_add(1, Ordering::Relaxed);
            }
            Err(RpcError::CircuitOpen) => {
                self.circuit_open.fetch_add(1, Ordering::Relaxed);
            }
            Err(RpcError::NoEndpoint) => {
                self.no_endpoint.fetch_add(1, Ordering::Relaxed);
            }
            Err(RpcError::PoolExhausted) => {
                self.pool_exhausted.fetch_add(1, Ordering::Relaxed);
            }
            Err(RpcError::Timeout) => {
                self.timed_out.fetch_add(1, Ordering::Relaxed);
            }
            Err(RpcError::Cancelled) => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            Err(RpcError::Infrastructure { .. }) => {
                self.infrastructure.fetch_add(1, Ordering::Relaxed);
            }
            Err(RpcError::Application { .. }) => {
                self.application.fetch_add(1, Ordering::Relaxed);
            }
            Err(RpcError::BatchResponseMissing) => {
                self.batch_response_missing.fetch_add(1, Ordering::Relaxed);
            }
            Err(RpcError::BatchQueueFull) => {
                self.batch_queue_full.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut samples = self.latencies.lock().unwrap();
        if samples.len() >= LATENCY_SAMPLE_WINDOW {
            samples.pop_front();
        }
        samples.push_back(duration);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_coalesced(&self) {
        self.cache_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_flush(&self, slot_count: usize) {
        self.batch_flushes.fetch_add(1, Ordering::Relaxed);
        self.batch_slots.fetch_add(slot_count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_hedge_primary_won(&self) {
        self.hedge_primary_wins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hedge_backup_won(&self) {
        self.hedge_backup_wins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hedge_all_failed(&self) {
        self.hedge_all_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_breaker_transition(&self) {
        self.breaker_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, endpoint_health: Vec<EndpointHealth>) -> MetricsSnapshot {
        let samples: Vec<Duration> = {
            let guard = self.latencies.lock().unwrap();
            guard.iter().copied().collect()
        };

        MetricsSnapshot {
            total_calls: self.total.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            circuit_open: self.circuit_open.load(Ordering::Relaxed),
            no_endpoint: self.no_endpoint.load(Ordering::Relaxed),
            pool_exhausted: self.pool_exhausted.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            infrastructure: self.infrastructure.load(Ordering::Relaxed),
            application: self.application.load(Ordering::Relaxed),
            batch_response_missing: self.batch_response_missing.load(Ordering::Relaxed),
            batch_queue_full: self.batch_queue_full.load(Ordering::Relaxed),
            p50_latency: percentile(&samples, 0.50),
            p95_latency: percentile(&samples, 0.95),
            p99_latency: percentile(&samples, 0.99),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_coalesced: self.cache_coalesced.load(Ordering::Relaxed),
            batch_slots: self.batch_slots.load(Ordering::Relaxed),
            batch_flushes: self.batch_flushes.load(Ordering::Relaxed),
            hedge_primary_wins: self.hedge_primary_wins.load(Ordering::Relaxed),
            hedge_backup_wins: self.hedge_backup_wins.load(Ordering::Relaxed),
            hedge_all_failed: self.hedge_all_failed.load(Ordering::Relaxed),
            breaker_transitions: self.breaker_transitions.load(Ordering::Relaxed),
            endpoint_health,
        }
    }
}

fn percentile(samples: &[Duration], p: f64) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    let mut sorted: Vec<Duration> = samples.to_vec();
    sorted.sort_unstable();
    let idx = ((sorted.len() as f64) * p) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// A point-in-time snapshot of the orchestrator's call counters, latency
/// percentiles, and the health of every collaborator it composes.
///
/// `batch_slots as f64 / batch_flushes as f64` is the average slots-per-wire-request
/// reduction a caller gets from batching, when `batch_flushes > 0`.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_calls: u64,
    pub succeeded: u64,
    pub rate_limited: u64,
    pub circuit_open: u64,
    pub no_endpoint: u64,
    pub pool_exhausted: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub infrastructure: u64,
    pub application: u64,
    pub batch_response_missing: u64,
    pub batch_queue_full: u64,
    pub p50_latency: Duration,
    pub p95_latency: Duration,
    pub p99_latency: Duration,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_coalesced: u64,
    pub batch_slots: u64,
    pub batch_flushes: u64,
    pub hedge_primary_wins: u64,
    pub hedge_backup_wins: u64,
    pub hedge_all_failed: u64,
    pub breaker_transitions: u64,
    pub endpoint_health: Vec<EndpointHealth>,
}

impl MetricsSnapshot {
    /// Fraction of calls served from the cache without invoking `coalesce`'s
    /// producer, i.e. plain hits. `None` if the cache has never been
    /// consulted.
    pub fn cache_hit_rate(&self) -> Option<f64> {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            None
        } else {
            Some(self.cache_hits as f64 / total as f64)
        }
    }

    /// Average batch size across every flush, i.e. how many slots one wire
    /// request carried on average. `None` if no batch has ever flushed.
    pub fn average_batch_size(&self) -> Option<f64> {
        if self.batch_flushes == 0 {
            None
        } else {
            Some(self.batch_slots as f64 / self.batch_flushes as f64)
        }
    }
}
