//! Error types for the connection pool.

/// Errors that can occur acquiring a pooled connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    /// The pool is at capacity (either the per-host or total bound) and no
    /// permit was available; with no `max_wait_duration` configured this is
    /// returned immediately instead of waiting.
    #[error("connection pool exhausted for host {host}")]
    Exhausted { host: String },

    /// Waiting for a permit exceeded `max_wait_duration`.
    #[error("timeout waiting for a pooled connection to {host}")]
    Timeout { host: String },

    /// The underlying HTTP client (TLS setup, DNS resolver) failed to
    /// initialize. Only ever returned by [`crate::ConnectionPool::new`].
    #[error("failed to initialize HTTP client: {0}")]
    ClientInit(String),
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
