use crate::events::TokenBucketEvent;
use rpc_resilience_core::events::{EventListeners, FnListener};

/// Configuration for [`crate::TokenBucket`].
pub struct TokenBucketConfig {
    pub(crate) capacity: f64,
    pub(crate) refill_rate: f64,
    pub(crate) burst_capacity: f64,
    pub(crate) event_listeners: EventListeners<TokenBucketEvent>,
    pub(crate) name: String,
}

/// Builder for [`TokenBucketConfig`].
pub struct TokenBucketConfigBuilder {
    capacity: f64,
    refill_rate: f64,
    burst_capacity: Option<f64>,
    event_listeners: EventListeners<TokenBucketEvent>,
    name: String,
}

impl Default for TokenBucketConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBucketConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - capacity: 50 tokens
    /// - refill_rate: 50 tokens/second
    /// - burst_capacity: equal to capacity (no extra burst headroom)
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            capacity: 50.0,
            refill_rate: 50.0,
            burst_capacity: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the steady-state token capacity.
    pub fn capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of tokens added per second.
    pub fn refill_rate(mut self, rate: f64) -> Self {
        self.refill_rate = rate;
        self
    }

    /// Sets the ceiling the bucket may reach after an idle period.
    ///
    /// Must be `>= capacity`; defaults to `capacity` if never called.
    pub fn burst_capacity(mut self, burst_capacity: f64) -> Self {
        self.burst_capacity = Some(burst_capacity);
        self
    }

    /// Sets the name for this bucket instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when tokens are successfully consumed.
    pub fn on_permit_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, f64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TokenBucketEvent::PermitAcquired {
                tokens, remaining, ..
            } = event
            {
                f(*tokens, *remaining);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call is rejected for lack of tokens.
    pub fn on_permit_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, f64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TokenBucketEvent::PermitRejected {
                tokens, available, ..
            } = event
            {
                f(*tokens, *available);
            }
        }));
        self
    }

    /// Builds the [`crate::TokenBucket`].
    pub fn build(self) -> crate::TokenBucket {
        let burst_capacity = self.burst_capacity.unwrap_or(self.capacity).max(self.capacity);
        let config = TokenBucketConfig {
            capacity: self.capacity,
            refill_rate: self.refill_rate,
            burst_capacity,
            event_listeners: self.event_listeners,
            name: self.name,
        };

        crate::TokenBucket::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenBucket;

    #[test]
    fn test_builder_defaults() {
        let _bucket = TokenBucket::builder().build();
    }

    #[test]
    fn test_builder_custom_values() {
        let _bucket = TokenBucket::builder()
            .capacity(100.0)
            .refill_rate(10.0)
            .burst_capacity(150.0)
            .name("rpc-admission")
            .build();
    }

    #[test]
    fn test_burst_capacity_floors_at_capacity() {
        let bucket = TokenBucket::builder().capacity(100.0).burst_capacity(10.0).build();
        assert_eq!(bucket.burst_capacity(), 100.0);
    }
}
