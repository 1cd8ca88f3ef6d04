//! Error types internal to the batch manager.

/// Errors raised by the batch manager itself, as opposed to per-slot
/// outcomes reported by the configured dispatcher (those surface directly
/// as [`rpc_resilience_core::RpcError`]).
#[derive(Debug, Clone, thiserror::Error)]
pub enum BatchError {
    /// [`crate::BatchManager::enqueue`] was called while the pending-slot
    /// count was already at `max_queue_size`; the caller should fall back
    /// to direct dispatch (§4.6 "Backpressure").
    #[error("batch queue is full")]
    QueueFull,

    /// A slot's response channel was dropped before a result was sent
    /// (the dispatcher task panicked). Surfaced to the caller as
    /// [`rpc_resilience_core::RpcError::Infrastructure`], which is safe to
    /// retry.
    #[error("batch slot was dropped before a response was routed to it")]
    SlotLost,

    /// [`crate::BatchManager`] was built without a dispatcher configured.
    #[error("no dispatcher configured for this batch manager")]
    NoDispatcher,
}
