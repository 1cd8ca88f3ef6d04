use std::sync::Mutex;
use std::time::Instant;

/// Mutable bucket state guarded by a single lock. Lazily refilled on every
/// access rather than by a background task, so an idle bucket costs nothing.
struct State {
    tokens: f64,
    last_refill: Instant,
}

impl State {
    fn refill(&mut self, now: Instant, refill_rate: f64, burst_capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * refill_rate).min(burst_capacity);
            self.last_refill = now;
        }
    }
}

/// Shared, lock-protected token bucket. Cloning shares the same underlying
/// state, mirroring the shared rate limiter this is adapted from.
pub(crate) struct SharedBucket {
    state: Mutex<State>,
    capacity: f64,
    refill_rate: f64,
    burst_capacity: f64,
}

impl SharedBucket {
    pub(crate) fn new(capacity: f64, refill_rate: f64, burst_capacity: f64) -> Self {
        Self {
            state: Mutex::new(State {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate,
            burst_capacity,
        }
    }

    /// Refills then atomically consumes `tokens`, returning `true` iff the
    /// consumption succeeded. All-or-nothing: a partial consumption never
    /// happens.
    pub(crate) fn try_consume(&self, tokens: f64) -> Result<f64, f64> {
        let mut state = self.state.lock().unwrap();
        state.refill(Instant::now(), self.refill_rate, self.burst_capacity);

        if state.tokens >= tokens {
            state.tokens -= tokens;
            Ok(state.tokens)
        } else {
            Err(state.tokens)
        }
    }

    /// Current token level after a lazy refill, without consuming anything.
    pub(crate) fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap();
        state.refill(Instant::now(), self.refill_rate, self.burst_capacity);
        state.tokens
    }

    pub(crate) fn capacity(&self) -> f64 {
        self.capacity
    }

    pub(crate) fn burst_capacity(&self) -> f64 {
        self.burst_capacity
    }
}
