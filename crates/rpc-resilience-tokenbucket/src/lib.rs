//! Token bucket admission control.
//!
//! A single process-wide bucket bounds the rate of upstream RPC calls while
//! tolerating short bursts. Tokens refill continuously at `refill_rate`
//! tokens/second up to `capacity`, and the bucket may rise as high as
//! `burst_capacity` immediately after an idle period.
//!
//! # Examples
//!
//! ```
//! use rpc_resilience_tokenbucket::TokenBucket;
//!
//! let bucket = TokenBucket::builder()
//!     .capacity(100.0)
//!     .refill_rate(100.0)
//!     .burst_capacity(150.0)
//!     .on_permit_rejected(|tokens, available| {
//!         println!("rejected a request for {tokens} tokens, {available} available");
//!     })
//!     .build();
//!
//! assert!(bucket.try_consume(1));
//! ```

mod bucket;
mod config;
mod error;
mod events;

pub use config::{TokenBucketConfig, TokenBucketConfigBuilder};
pub use error::TokenBucketError;
pub use events::TokenBucketEvent;

use bucket::SharedBucket;
use std::sync::Arc;
use std::time::Instant;

/// Process-wide admission gate. Cheap to clone; clones share the same
/// underlying bucket and lock.
#[derive(Clone)]
pub struct TokenBucket {
    inner: Arc<SharedBucket>,
    event_listeners: Arc<rpc_resilience_core::events::EventListeners<TokenBucketEvent>>,
    name: Arc<str>,
}

impl TokenBucket {
    pub(crate) fn new(config: TokenBucketConfig) -> Self {
        let inner = SharedBucket::new(config.capacity, config.refill_rate, config.burst_capacity);

        Self {
            inner: Arc::new(inner),
            event_listeners: Arc::new(config.event_listeners),
            name: config.name.into(),
        }
    }

    /// Creates a builder with sensible defaults; see [`TokenBucketConfigBuilder`].
    pub fn builder() -> TokenBucketConfigBuilder {
        TokenBucketConfigBuilder::new()
    }

    /// Attempts to consume a single token. Shorthand for `try_consume_n(1)`.
    pub fn try_consume(&self, n: u32) -> bool {
        self.try_consume_n(n)
    }

    /// Attempts to consume `n` tokens atomically; `n` tokens are either all
    /// taken or none are. Used as-is for a single call (`n == 1`) and for a
    /// flushed batch, which consumes one token per upstream HTTP request
    /// rather than one per slot.
    pub fn try_consume_n(&self, n: u32) -> bool {
        let result = self.inner.try_consume(n as f64);
        match result {
            Ok(remaining) => {
                self.event_listeners.emit(&TokenBucketEvent::PermitAcquired {
                    pattern_name: self.name.to_string(),
                    timestamp: Instant::now(),
                    tokens: n,
                    remaining,
                });
                true
            }
            Err(available) => {
                self.event_listeners.emit(&TokenBucketEvent::PermitRejected {
                    pattern_name: self.name.to_string(),
                    timestamp: Instant::now(),
                    tokens: n,
                    available,
                });
                false
            }
        }
    }

    /// Current token level after a lazy refill, without consuming anything.
    pub fn available(&self) -> f64 {
        self.inner.available()
    }

    /// The configured steady-state capacity.
    pub fn capacity(&self) -> f64 {
        self.inner.capacity()
    }

    /// The configured burst ceiling.
    pub fn burst_capacity(&self) -> f64 {
        self.inner.burst_capacity()
    }
}
