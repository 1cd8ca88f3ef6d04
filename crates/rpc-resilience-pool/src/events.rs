use rpc_resilience_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by the connection pool as sockets are acquired and released.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    /// A socket was acquired for `host`; `concurrent_for_host` is the
    /// number of sockets now checked out for that host alone.
    SocketAcquired {
        pattern_name: String,
        timestamp: Instant,
        host: String,
        concurrent_for_host: usize,
    },
    /// An acquisition was rejected because the pool was at capacity.
    SocketRejected {
        pattern_name: String,
        timestamp: Instant,
        host: String,
    },
    /// A checked-out socket was returned to the pool.
    SocketReleased {
        pattern_name: String,
        timestamp: Instant,
        host: String,
        held_for: Duration,
    },
}

impl ResilienceEvent for PoolEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PoolEvent::SocketAcquired { .. } => "socket_acquired",
            PoolEvent::SocketRejected { .. } => "socket_rejected",
            PoolEvent::SocketReleased { .. } => "socket_released",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            PoolEvent::SocketAcquired { timestamp, .. } => *timestamp,
            PoolEvent::SocketRejected { timestamp, .. } => *timestamp,
            PoolEvent::SocketReleased { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            PoolEvent::SocketAcquired { pattern_name, .. } => pattern_name,
            PoolEvent::SocketRejected { pattern_name, .. } => pattern_name,
            PoolEvent::SocketReleased { pattern_name, .. } => pattern_name,
        }
    }
}
