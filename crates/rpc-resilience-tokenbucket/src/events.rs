use rpc_resilience_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by [`crate::TokenBucket`] as it admits or rejects calls.
#[derive(Debug, Clone)]
pub enum TokenBucketEvent {
    /// A call consumed `tokens` successfully; `remaining` is the level
    /// immediately after consumption.
    PermitAcquired {
        pattern_name: String,
        timestamp: Instant,
        tokens: u32,
        remaining: f64,
    },

    /// A call was rejected because fewer than `tokens` were available.
    PermitRejected {
        pattern_name: String,
        timestamp: Instant,
        tokens: u32,
        available: f64,
    },
}

impl ResilienceEvent for TokenBucketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TokenBucketEvent::PermitAcquired { .. } => "permit_acquired",
            TokenBucketEvent::PermitRejected { .. } => "permit_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TokenBucketEvent::PermitAcquired { timestamp, .. } => *timestamp,
            TokenBucketEvent::PermitRejected { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            TokenBucketEvent::PermitAcquired { pattern_name, .. } => pattern_name,
            TokenBucketEvent::PermitRejected { pattern_name, .. } => pattern_name,
        }
    }
}
