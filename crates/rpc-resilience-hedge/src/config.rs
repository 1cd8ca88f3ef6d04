//! Configuration for the hedged-request manager.

use crate::events::HedgeEvent;
use rpc_resilience_core::events::{EventListeners, FnListener};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Delay strategy before firing the backup attempt.
///
/// Mirrors the teacher crate's own `HedgeDelay` enum name and its
/// fixed/parallel split, generalized with a third arm for the distilled
/// spec's optional adaptive-P95 delay (§4.7: "track recent primary
/// latencies and set `hedge_delay_ms` to the observed P95, clamped to a
/// configured range").
#[derive(Clone)]
pub enum HedgeDelay {
    /// Wait a fixed duration before dispatching the backup.
    Fixed(Duration),
    /// Wait the observed P95 of recent primary latencies, clamped to
    /// `[min, max]`. Falls back to `min` until enough samples exist.
    Adaptive {
        min: Duration,
        max: Duration,
        samples: Arc<Mutex<VecDeque<Duration>>>,
        window: usize,
    },
}

impl HedgeDelay {
    /// Creates an adaptive delay tracking the last `window` primary
    /// latencies, clamped to `[min, max]`.
    pub fn adaptive(min: Duration, max: Duration, window: usize) -> Self {
        HedgeDelay::Adaptive {
            min,
            max,
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(window))),
            window,
        }
    }

    /// The delay to use for the next call.
    pub(crate) fn current(&self) -> Duration {
        match self {
            HedgeDelay::Fixed(d) => *d,
            HedgeDelay::Adaptive { min, max, samples, .. } => {
                let guard = samples.lock().unwrap();
                if guard.is_empty() {
                    return *min;
                }
                let mut sorted: Vec<Duration> = guard.iter().copied().collect();
                sorted.sort_unstable();
                let idx = ((sorted.len() as f64) * 0.95) as usize;
                let p95 = sorted[idx.min(sorted.len() - 1)];
                p95.clamp(*min, *max)
            }
        }
    }

    /// Records a completed primary-attempt latency, for the adaptive
    /// variant's rolling window. No-op for `Fixed`.
    pub(crate) fn record_primary_latency(&self, duration: Duration) {
        if let HedgeDelay::Adaptive { samples, window, .. } = self {
            let mut guard = samples.lock().unwrap();
            if guard.len() >= *window {
                guard.pop_front();
            }
            guard.push_back(duration);
        }
    }
}

impl Default for HedgeDelay {
    /// §4.7 default: 200ms fixed delay.
    fn default() -> Self {
        HedgeDelay::Fixed(Duration::from_millis(200))
    }
}

/// Configuration for [`crate::HedgedManager`].
pub struct HedgeConfig {
    pub(crate) delay: HedgeDelay,
    pub(crate) event_listeners: EventListeners<HedgeEvent>,
    pub(crate) name: String,
}

impl HedgeConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> HedgeConfigBuilder {
        HedgeConfigBuilder::new()
    }
}

/// Builder for [`HedgeConfig`].
pub struct HedgeConfigBuilder {
    delay: HedgeDelay,
    event_listeners: EventListeners<HedgeEvent>,
    name: String,
}

impl HedgeConfigBuilder {
    /// Creates a new builder with default values: a fixed 200ms delay.
    pub fn new() -> Self {
        Self {
            delay: HedgeDelay::default(),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets a fixed delay before firing the backup attempt.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = HedgeDelay::Fixed(delay);
        self
    }

    /// Uses an adaptive P95-based delay instead of a fixed one.
    pub fn adaptive_delay(mut self, min: Duration, max: Duration, window: usize) -> Self {
        self.delay = HedgeDelay::adaptive(min, max, window);
        self
    }

    /// Sets the name of this hedge instance for observability.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when the backup attempt is dispatched.
    pub fn on_backup_started<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let HedgeEvent::BackupStarted { delay_elapsed, .. } = event {
                f(*delay_elapsed);
            }
        }));
        self
    }

    /// Registers a callback invoked when the backup attempt wins the race.
    pub fn on_backup_won<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let HedgeEvent::BackupWon { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback invoked when the primary attempt wins the race.
    pub fn on_primary_won<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let HedgeEvent::PrimaryWon { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback invoked when every dispatched attempt failed.
    pub fn on_all_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let HedgeEvent::AllFailed { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Builds the hedged-request manager.
    pub fn build(self) -> crate::HedgedManager {
        let config = HedgeConfig {
            delay: self.delay,
            event_listeners: self.event_listeners,
            name: self.name,
        };
        crate::HedgedManager::new(config)
    }
}

impl Default for HedgeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delay_is_200ms() {
        let config = HedgeConfig::builder().build();
        assert_eq!(config.delay.current(), Duration::from_millis(200));
    }

    #[test]
    fn adaptive_delay_falls_back_to_min_with_no_samples() {
        let delay = HedgeDelay::adaptive(
            Duration::from_millis(50),
            Duration::from_millis(500),
            20,
        );
        assert_eq!(delay.current(), Duration::from_millis(50));
    }

    #[test]
    fn adaptive_delay_tracks_p95_clamped_to_range() {
        let delay = HedgeDelay::adaptive(
            Duration::from_millis(10),
            Duration::from_millis(100),
            20,
        );
        for ms in 1..=20u64 {
            delay.record_primary_latency(Duration::from_millis(ms * 10));
        }
        // p95 of 10ms..=200ms in 10ms steps is clamped to the 100ms ceiling.
        assert_eq!(delay.current(), Duration::from_millis(100));
    }
}
