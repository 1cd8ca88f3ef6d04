//! Error types for the hedged-request manager.

/// Errors intrinsic to hedge execution itself, as opposed to errors
/// returned by the attempts it races (those surface as-is through
/// [`crate::HedgedManager::run`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HedgeError {
    /// A spawned attempt task was lost (panicked, or the runtime dropped
    /// it) before it sent a result back to the race.
    #[error("hedge attempt task was lost before producing a result")]
    AttemptLost,
}
