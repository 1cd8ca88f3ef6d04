//! Events emitted by the batch manager.

use rpc_resilience_core::ResilienceEvent;
use std::time::Instant;

/// What caused a batch to flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The active batch reached `batch_size` slots.
    SizeReached,
    /// `batch_window` elapsed since the first slot was enqueued.
    WindowElapsed,
    /// [`crate::BatchManager::flush`] was called explicitly.
    Explicit,
}

/// Events emitted by [`crate::BatchManager`].
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// A call was added to the currently accumulating batch.
    Enqueued {
        pattern_name: String,
        timestamp: Instant,
        method: String,
        queue_depth: usize,
    },
    /// A batch was frozen and handed to the dispatcher.
    Flushed {
        pattern_name: String,
        timestamp: Instant,
        slot_count: usize,
        trigger: FlushTrigger,
    },
    /// `enqueue` was rejected because `max_queue_size` pending slots were
    /// already outstanding.
    QueueFull {
        pattern_name: String,
        timestamp: Instant,
    },
    /// A slot had no matching response `id` in the dispatcher's reply.
    ResponseMissing {
        pattern_name: String,
        timestamp: Instant,
        id: u64,
    },
}

impl ResilienceEvent for BatchEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BatchEvent::Enqueued { .. } => "enqueued",
            BatchEvent::Flushed { .. } => "flushed",
            BatchEvent::QueueFull { .. } => "queue_full",
            BatchEvent::ResponseMissing { .. } => "response_missing",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BatchEvent::Enqueued { timestamp, .. } => *timestamp,
            BatchEvent::Flushed { timestamp, .. } => *timestamp,
            BatchEvent::QueueFull { timestamp, .. } => *timestamp,
            BatchEvent::ResponseMissing { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            BatchEvent::Enqueued { pattern_name, .. } => pattern_name,
            BatchEvent::Flushed { pattern_name, .. } => pattern_name,
            BatchEvent::QueueFull { pattern_name, .. } => pattern_name,
            BatchEvent::ResponseMissing { pattern_name, .. } => pattern_name,
        }
    }
}
