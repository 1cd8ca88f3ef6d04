//! Endpoint selection with health tracking for a set of functionally
//! equivalent upstreams.
//!
//! Holds an ordered set of endpoints and round-robins over the currently
//! healthy ones. An endpoint is quarantined after `max_failures`
//! consecutive failures and offered again as a probe once
//! `health_check_interval` elapses since its last failure. Unlike the
//! teacher's health-check crate, there is no external probing loop here —
//! health is derived purely from the call outcomes the orchestrator
//! reports via `record_success`/`record_failure`.
//!
//! ```rust
//! use rpc_resilience_endpoint::EndpointSelector;
//!
//! let selector = EndpointSelector::builder()
//!     .endpoint("https://a.example.com")
//!     .endpoint("https://b.example.com")
//!     .max_failures(3)
//!     .build();
//!
//! if let Some(endpoint) = selector.select() {
//!     // dispatch to endpoint.url, then:
//!     selector.record_success(endpoint.id);
//! }
//! ```

mod config;
mod events;

pub use config::{EndpointSelectorConfig, EndpointSelectorConfigBuilder};
pub use events::EndpointEvent;

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const NEVER: u64 = u64::MAX;

/// A single upstream's identity and mutable health counters.
struct EndpointState {
    id: usize,
    url: String,
    consecutive_failures: AtomicU32,
    last_success_millis: AtomicU64,
    last_failure_millis: AtomicU64,
}

impl EndpointState {
    fn new(id: usize, url: String) -> Self {
        Self {
            id,
            url,
            consecutive_failures: AtomicU32::new(0),
            last_success_millis: AtomicU64::new(NEVER),
            last_failure_millis: AtomicU64::new(NEVER),
        }
    }

    fn is_candidate(&self, epoch: Instant, max_failures: u32, health_check_interval: Duration) -> bool {
        let failures = self.consecutive_failures.load(Ordering::Acquire);
        if failures < max_failures {
            return true;
        }
        let last_failure = self.last_failure_millis.load(Ordering::Acquire);
        if last_failure == NEVER {
            return true;
        }
        elapsed_millis(epoch).saturating_sub(last_failure) >= health_check_interval.as_millis() as u64
    }

    fn to_handle(&self) -> EndpointHandle {
        EndpointHandle {
            id: self.id,
            url: self.url.clone(),
        }
    }
}

fn elapsed_millis(epoch: Instant) -> u64 {
    epoch.elapsed().as_millis() as u64
}

/// A lightweight, owned reference to a selected endpoint: what `select`
/// and `select_pair` hand back for the caller to dispatch against and
/// later report the outcome of via `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointHandle {
    pub id: usize,
    pub url: String,
}

/// Read-only health snapshot of one endpoint, for the manager's metrics
/// surface.
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    pub id: usize,
    pub url: String,
    pub consecutive_failures: u32,
    pub quarantined: bool,
}

/// Selects among a fixed set of functionally equivalent upstream
/// endpoints, tracking per-endpoint health.
///
/// Cheap to clone; clones share the same underlying state.
#[derive(Clone)]
pub struct EndpointSelector {
    endpoints: Arc<Vec<EndpointState>>,
    cursor: Arc<AtomicUsize>,
    epoch: Instant,
    config: Arc<EndpointSelectorConfig>,
}

impl EndpointSelector {
    pub(crate) fn new(config: EndpointSelectorConfig) -> Self {
        let endpoints = config
            .urls
            .iter()
            .enumerate()
            .map(|(id, url)| EndpointState::new(id, url.clone()))
            .collect();
        Self {
            endpoints: Arc::new(endpoints),
            cursor: Arc::new(AtomicUsize::new(0)),
            epoch: Instant::now(),
            config: Arc::new(config),
        }
    }

    /// Creates a builder with defaults; see [`EndpointSelectorConfigBuilder`].
    pub fn builder() -> EndpointSelectorConfigBuilder {
        EndpointSelectorConfigBuilder::new()
    }

    /// Selects the next endpoint to dispatch to, round-robining over the
    /// currently healthy set.
    ///
    /// If every endpoint is quarantined, falls back to the one with the
    /// oldest last-failure time (the one most overdue for its health
    /// check) as a forced probe. Returns `None` only if every endpoint is
    /// quarantined and none has reached `health_check_interval` yet
    /// (`NO_ENDPOINT`).
    pub fn select(&self) -> Option<EndpointHandle> {
        self.select_one().map(|(handle, _was_probe)| handle)
    }

    /// Selects two distinct endpoints for a hedged call: `(primary,
    /// backup)`. `backup` is `Some` only if a second, distinct endpoint is
    /// available; the hedged manager must gracefully downgrade to a
    /// non-hedged call when it is `None`. Returns `None` only under the
    /// same `NO_ENDPOINT` condition as [`EndpointSelector::select`].
    pub fn select_pair(&self) -> Option<(EndpointHandle, Option<EndpointHandle>)> {
        let (primary, _) = self.select_one()?;
        let backup = self
            .candidates()
            .into_iter()
            .find(|e| e.id != primary.id)
            .map(|e| e.to_handle());
        Some((primary, backup))
    }

    fn select_one(&self) -> Option<(EndpointHandle, bool)> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            self.config.event_listeners.emit(&EndpointEvent::AllQuarantined {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
            });
            return None;
        }

        let healthy: Vec<&EndpointState> = candidates
            .iter()
            .copied()
            .filter(|e| e.consecutive_failures.load(Ordering::Acquire) < self.config.max_failures)
            .collect();

        let (chosen, was_probe) = if !healthy.is_empty() {
            let idx = self.cursor.fetch_add(1, Ordering::SeqCst) % healthy.len();
            (healthy[idx], false)
        } else {
            // Every candidate is quarantined but has reached its cooldown;
            // tie-break on the oldest last-failure time.
            let oldest = candidates
                .iter()
                .copied()
                .min_by_key(|e| e.last_failure_millis.load(Ordering::Acquire))
                .expect("candidates is non-empty");
            (oldest, true)
        };

        self.config.event_listeners.emit(&EndpointEvent::Selected {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
            endpoint_id: chosen.id,
            url: chosen.url.clone(),
            was_probe,
        });

        Some((chosen.to_handle(), was_probe))
    }

    /// Endpoints currently eligible for selection: healthy ones, plus any
    /// quarantined endpoint whose cooldown has elapsed.
    fn candidates(&self) -> Vec<&EndpointState> {
        self.endpoints
            .iter()
            .filter(|e| e.is_candidate(self.epoch, self.config.max_failures, self.config.health_check_interval))
            .collect()
    }

    /// Records a successful call against the endpoint with the given id,
    /// resetting its consecutive-failure count.
    pub fn record_success(&self, id: usize) {
        let Some(endpoint) = self.endpoints.iter().find(|e| e.id == id) else {
            return;
        };
        let was_quarantined = endpoint.consecutive_failures.load(Ordering::Acquire) >= self.config.max_failures;
        endpoint.consecutive_failures.store(0, Ordering::Release);
        endpoint
            .last_success_millis
            .store(elapsed_millis(self.epoch), Ordering::Release);

        if was_quarantined {
            self.config.event_listeners.emit(&EndpointEvent::Recovered {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                endpoint_id: endpoint.id,
                url: endpoint.url.clone(),
            });
        }
    }

    /// Records a failed call against the endpoint with the given id,
    /// incrementing its consecutive-failure count. Quarantines the
    /// endpoint once the count reaches `max_failures`.
    pub fn record_failure(&self, id: usize) {
        let Some(endpoint) = self.endpoints.iter().find(|e| e.id == id) else {
            return;
        };
        let failures = endpoint.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        endpoint
            .last_failure_millis
            .store(elapsed_millis(self.epoch), Ordering::Release);

        if failures == self.config.max_failures {
            self.config.event_listeners.emit(&EndpointEvent::Quarantined {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                endpoint_id: endpoint.id,
                url: endpoint.url.clone(),
                consecutive_failures: failures,
            });
        }
    }

    /// Returns a read-only health snapshot of every endpoint, for the
    /// manager's metrics surface.
    pub fn health_snapshot(&self) -> Vec<EndpointHealth> {
        self.endpoints
            .iter()
            .map(|e| EndpointHealth {
                id: e.id,
                url: e.url.clone(),
                consecutive_failures: e.consecutive_failures.load(Ordering::Acquire),
                quarantined: !e.is_candidate(self.epoch, self.config.max_failures, self.config.health_check_interval),
            })
            .collect()
    }
}
