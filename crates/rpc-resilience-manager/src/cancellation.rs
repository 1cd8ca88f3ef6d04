//! Cooperative cancellation signal for in-flight calls.
//!
//! The orchestrator's retry and hedge loops poll this between attempts
//! rather than forcibly aborting a future, so a caller's `trigger()` stops
//! the *next* attempt from starting instead of interrupting one mid-flight.
//! Backed by [`tokio_util::sync::CancellationToken`], which already gives us
//! a cheap-to-clone, multi-waiter signal; `CancellationSignal` just narrows
//! the vocabulary to the one this crate's call contract uses.

use tokio_util::sync::CancellationToken;

/// A cooperative, cloneable cancellation signal passed to
/// [`crate::RpcManager::call`] via [`crate::CallOptions`].
///
/// Cloning shares the same underlying signal; triggering any clone
/// triggers all of them.
#[derive(Clone, Debug, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
}

impl CancellationSignal {
    /// Creates a new, untriggered signal.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Fires the signal. Idempotent; triggering an already-triggered signal
    /// is a no-op.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Returns `true` if [`CancellationSignal::trigger`] has been called on
    /// this signal or any of its clones.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this signal fires. Safe to await from multiple tasks
    /// and multiple times from the same task.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Creates a child signal that is cancelled whenever this one is, but
    /// can also be cancelled independently without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Registers a callback to run once this signal fires. Spawns a task
    /// that awaits [`CancellationSignal::cancelled`]; if the signal never
    /// fires, the task parks for the lifetime of the process, matching
    /// `tokio_util`'s own guidance for this pattern.
    pub fn on_cancel<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            f();
        });
    }
}
