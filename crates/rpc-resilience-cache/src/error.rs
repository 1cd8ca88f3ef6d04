//! Error types for the request cache.

use std::fmt;

/// Errors that can occur while coalescing concurrent cache misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// The in-flight producer this call was waiting on was dropped (e.g. its
    /// task panicked or was cancelled) before it produced a result or an
    /// error. Waiters see this instead of hanging forever.
    LeaderLost,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::LeaderLost => {
                write!(f, "cache coalescing leader was lost before producing a result")
            }
        }
    }
}

impl std::error::Error for CacheError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leader_lost_display() {
        assert_eq!(
            CacheError::LeaderLost.to_string(),
            "cache coalescing leader was lost before producing a result"
        );
    }
}
