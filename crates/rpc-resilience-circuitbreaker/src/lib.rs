//! Circuit breaker for upstream RPC calls.
//!
//! A circuit breaker prevents cascading failures by monitoring call outcomes
//! and temporarily rejecting new calls when the failure rate exceeds a
//! threshold.
//!
//! ## States
//! - **Closed**: normal operation, all calls are admitted.
//! - **Open**: calls are rejected immediately until `wait_duration_in_open` elapses.
//! - **Half-Open**: a bounded number of probe calls are admitted to test recovery.
//!
//! Unlike the Tower-middleware version this crate is adapted from, a
//! `CircuitBreaker` here is a plain orchestrator collaborator: the caller
//! asks `allow()` before dispatching a call and reports the outcome via
//! `on_success()`/`on_failure()` afterward, rather than the breaker wrapping
//! a `tower::Service` itself.
//!
//! ```rust
//! use rpc_resilience_circuitbreaker::CircuitBreaker;
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::builder()
//!     .failure_rate_threshold(0.6)
//!     .sliding_window_size(10)
//!     .wait_duration_in_open(Duration::from_secs(30))
//!     .build();
//!
//! if breaker.allow() {
//!     // dispatch the call, then:
//!     breaker.on_success(Duration::from_millis(20));
//! }
//! ```

mod circuit;
pub mod classifier;
mod config;
mod events;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, SlidingWindowType};
pub use events::CircuitBreakerEvent;

use circuit::Circuit;
use parking_lot::Mutex;
use rpc_resilience_core::RpcError;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A circuit breaker guarding calls to a single upstream.
///
/// Cheap to clone; clones share the same underlying state.
#[derive(Clone)]
pub struct CircuitBreaker {
    circuit: Arc<Mutex<Circuit>>,
    state_atomic: Arc<AtomicU8>,
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreaker {
    pub(crate) fn new(config: CircuitBreakerConfig) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            circuit: Arc::new(Mutex::new(Circuit::new_with_atomic(Arc::clone(
                &state_atomic,
            )))),
            state_atomic,
            config: Arc::new(config),
        }
    }

    /// Creates a builder with defaults; see [`CircuitBreakerConfigBuilder`].
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Returns `true` if a call may proceed right now. While `Open`, returns
    /// `false` until `wait_duration_in_open` elapses, at which point the
    /// breaker transitions to `HalfOpen` and admits one probe. While
    /// `HalfOpen`, at most `permitted_calls_in_half_open` concurrent probes
    /// are admitted.
    pub fn allow(&self) -> bool {
        let mut circuit = self.circuit.lock();
        circuit.try_acquire(&self.config)
    }

    /// Records a successful call and its duration.
    pub fn on_success(&self, duration: Duration) {
        let mut circuit = self.circuit.lock();
        circuit.record_success(&self.config, duration);
    }

    /// Records a failed call and its duration.
    pub fn on_failure(&self, duration: Duration) {
        let mut circuit = self.circuit.lock();
        circuit.record_failure(&self.config, duration);
    }

    /// Classifies `result` with the configured failure classifier and
    /// records the outcome, a convenience wrapper around
    /// `on_success`/`on_failure` for call sites that already have a
    /// `Result<T, RpcError>` and a measured duration in hand.
    pub fn record_result<T>(&self, result: &Result<T, RpcError>, duration: Duration) {
        let is_failure = match result {
            Ok(_) => false,
            Err(e) => (self.config.failure_classifier)(e),
        };
        if is_failure {
            self.on_failure(duration);
        } else {
            self.on_success(duration);
        }
    }

    /// Forces the circuit into the open state.
    pub fn force_open(&self) {
        let mut circuit = self.circuit.lock();
        circuit.force_open(&self.config);
    }

    /// Forces the circuit into the closed state.
    pub fn force_closed(&self) {
        let mut circuit = self.circuit.lock();
        circuit.force_closed(&self.config);
    }

    /// Resets the circuit to closed and clears counts.
    pub fn reset(&self) {
        let mut circuit = self.circuit.lock();
        circuit.reset(&self.config);
    }

    /// Returns a snapshot of the current counters and state.
    pub fn metrics(&self) -> CircuitMetrics {
        let circuit = self.circuit.lock();
        circuit.metrics(&self.config)
    }

    /// Returns the current state without taking the lock.
    ///
    /// Safe to call from sync code (e.g. the manager's metrics snapshot);
    /// reads an `AtomicU8` kept synchronized with the locked state.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }
}
