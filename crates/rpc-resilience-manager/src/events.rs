//! Call-level events emitted by [`crate::RpcManager`] itself, as opposed to
//! the per-component events each collaborator already emits.

use rpc_resilience_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// A terminal outcome for one [`crate::RpcManager::call`] invocation, after
/// all internal retries have been exhausted.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The call resolved successfully.
    Completed {
        pattern_name: String,
        timestamp: Instant,
        method: String,
        duration: Duration,
    },
    /// The call failed after exhausting any applicable retries.
    Failed {
        pattern_name: String,
        timestamp: Instant,
        method: String,
        duration: Duration,
        error: String,
    },
}

impl ResilienceEvent for CallEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CallEvent::Completed { .. } => "completed",
            CallEvent::Failed { .. } => "failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CallEvent::Completed { timestamp, .. } => *timestamp,
            CallEvent::Failed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CallEvent::Completed { pattern_name, .. } => pattern_name,
            CallEvent::Failed { pattern_name, .. } => pattern_name,
        }
    }
}
