use rpc_resilience_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by [`crate::RequestCache`].
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// `get`/`coalesce` found a live, unexpired entry.
    Hit {
        pattern_name: String,
        timestamp: Instant,
        key: String,
    },
    /// No entry was found (or it had expired).
    Miss {
        pattern_name: String,
        timestamp: Instant,
        key: String,
    },
    /// A concurrent caller joined an in-flight producer instead of
    /// starting its own (§4.5 "coalesce concurrent identical misses").
    Coalesced {
        pattern_name: String,
        timestamp: Instant,
        key: String,
    },
    /// An entry was evicted, either for space (LRU) or because it expired
    /// during a sweep.
    Eviction {
        pattern_name: String,
        timestamp: Instant,
        key: String,
    },
}

impl ResilienceEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Coalesced { .. } => "coalesced",
            CacheEvent::Eviction { .. } => "eviction",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. } => *timestamp,
            CacheEvent::Miss { timestamp, .. } => *timestamp,
            CacheEvent::Coalesced { timestamp, .. } => *timestamp,
            CacheEvent::Eviction { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CacheEvent::Hit { pattern_name, .. } => pattern_name,
            CacheEvent::Miss { pattern_name, .. } => pattern_name,
            CacheEvent::Coalesced { pattern_name, .. } => pattern_name,
            CacheEvent::Eviction { pattern_name, .. } => pattern_name,
        }
    }
}
