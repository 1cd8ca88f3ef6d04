//! Hedged-request manager: race a primary attempt against a delayed
//! backup to reduce tail latency (§4.7).
//!
//! Grounded directly on the teacher crate's `execute_with_hedging`
//! (a channel of `(attempt_index, Result)` raced via `tokio::select!`
//! against a delay future), generalized here from "N identical hedges
//! against the same endpoint" to exactly one backup attempt against a
//! *different* endpoint (§8 invariant 5) — so `run` takes two caller-built
//! attempt closures rather than cloning one service N times. Each closure
//! performs whatever the orchestrator's steps 6-8 are for that endpoint
//! (connect, dispatch, decode); this crate only races them and tracks
//! which one is in flight.
//!
//! ```rust,no_run
//! use rpc_resilience_hedge::{Attempt, HedgedManager};
//! use rpc_resilience_core::RpcError;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let manager = HedgedManager::builder()
//!     .delay(Duration::from_millis(200))
//!     .build();
//!
//! let primary: Attempt = Box::new(|| Box::pin(async { Ok(serde_json::json!(1)) }));
//! let backup: Option<Attempt> =
//!     Some(Box::new(|| Box::pin(async { Ok::<_, RpcError>(serde_json::json!(2)) })));
//!
//! let _ = manager.run(primary, backup).await;
//! # }
//! ```

mod config;
mod error;
mod events;

pub use config::{HedgeConfig, HedgeConfigBuilder, HedgeDelay};
pub use error::HedgeError;
pub use events::HedgeEvent;

use futures::future::BoxFuture;
use rpc_resilience_core::RpcError;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// A single hedge attempt: a thunk producing the boxed future that
/// performs the dispatch. Boxed rather than generic because the primary
/// and backup attempts close over different endpoints and are
/// constructed independently by the caller.
pub type Attempt = Box<dyn FnOnce() -> BoxFuture<'static, Result<Value, RpcError>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptKind {
    Primary,
    Backup,
}

/// Owns a spawned attempt's `JoinHandle` and aborts it on drop.
///
/// `run` holds one of these per in-flight attempt for the lifetime of its
/// `select!` loop. If `run`'s own future is dropped early — the caller's
/// cancellation token fired, or its `tokio::time::timeout` elapsed — every
/// `AttemptHandle` still held drops with it, aborting whatever in-flight
/// HTTP request that attempt was making rather than leaking it as a
/// detached task (§4.7, §5 "aborts in-flight HTTP requests"). Aborting an
/// already-finished task is a no-op, so this is safe to drop unconditionally
/// on the normal completion path too.
struct AttemptHandle(tokio::task::JoinHandle<()>);

impl Drop for AttemptHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Races a primary attempt against an optional backup attempt.
///
/// Cheap to clone; clones share the same configuration and active-attempt
/// counter.
#[derive(Clone)]
pub struct HedgedManager {
    config: Arc<HedgeConfig>,
    active_attempts: Arc<AtomicUsize>,
}

impl HedgedManager {
    pub(crate) fn new(config: HedgeConfig) -> Self {
        Self {
            config: Arc::new(config),
            active_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a builder with defaults; see [`HedgeConfigBuilder`].
    pub fn builder() -> HedgeConfigBuilder {
        HedgeConfigBuilder::new()
    }

    /// Number of hedge attempts currently in flight across every call to
    /// [`HedgedManager::run`] on this instance. A health check can assert
    /// this is 0 between calls (§8 invariant 6: "after a hedged call
    /// resolves, the manager's active-attempt table has size 0
    /// attributable to that call").
    pub fn active_attempts(&self) -> usize {
        self.active_attempts.load(Ordering::SeqCst)
    }

    /// Races `primary` against `backup`.
    ///
    /// If `backup` is `Some`, it fires after the configured delay elapses
    /// without `primary` completing, or immediately if `primary` fails
    /// first (waiting out the rest of the delay at that point buys
    /// nothing). If `backup` is `None` — e.g. `select_pair` found fewer
    /// than two healthy endpoints — this degrades to awaiting `primary`
    /// alone.
    ///
    /// Whichever attempt resolves first (successfully, or unsuccessfully
    /// with no other attempt left to wait on) wins; the other attempt's
    /// task is aborted so nothing is left dangling, and its eventual
    /// response, if any, is discarded.
    pub async fn run(&self, primary: Attempt, backup: Option<Attempt>) -> Result<Value, RpcError> {
        let start = Instant::now();
        self.config.event_listeners.emit(&HedgeEvent::PrimaryStarted {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
        });

        let (tx, mut rx) = mpsc::channel::<(AttemptKind, Result<Value, RpcError>)>(2);

        self.active_attempts.fetch_add(1, Ordering::SeqCst);
        let mut primary_handle = {
            let tx = tx.clone();
            Some(AttemptHandle(tokio::spawn(async move {
                let result = primary().await;
                let _ = tx.send((AttemptKind::Primary, result)).await;
            })))
        };

        let mut backup = backup;
        let has_backup = backup.is_some();
        let delay = if has_backup {
            self.config.delay.current()
        } else {
            Duration::MAX
        };
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        let mut backup_handle: Option<AttemptHandle> = None;
        let mut backup_fired = false;
        let mut primary_done = false;

        let outcome = loop {
            tokio::select! {
                biased;

                Some((kind, result)) = rx.recv() => {
                    self.active_attempts.fetch_sub(1, Ordering::SeqCst);

                    match kind {
                        AttemptKind::Primary => {
                            primary_done = true;
                            primary_handle = None;
                            self.config.delay.record_primary_latency(start.elapsed());
                        }
                        AttemptKind::Backup => {
                            backup_handle = None;
                        }
                    }

                    match result {
                        Ok(value) => {
                            let loser = match kind {
                                AttemptKind::Primary => backup_handle.take(),
                                AttemptKind::Backup => primary_handle.take(),
                            };
                            if let Some(handle) = loser {
                                // Dropping the guard aborts the loser's still-running task.
                                drop(handle);
                                self.active_attempts.fetch_sub(1, Ordering::SeqCst);
                            }

                            match kind {
                                AttemptKind::Primary => {
                                    self.config.event_listeners.emit(&HedgeEvent::PrimaryWon {
                                        pattern_name: self.config.name.clone(),
                                        timestamp: Instant::now(),
                                        duration: start.elapsed(),
                                        backup_was_running: has_backup,
                                    });
                                }
                                AttemptKind::Backup => {
                                    self.config.event_listeners.emit(&HedgeEvent::BackupWon {
                                        pattern_name: self.config.name.clone(),
                                        timestamp: Instant::now(),
                                        duration: start.elapsed(),
                                    });
                                }
                            }

                            break Ok(value);
                        }
                        Err(e) => {
                            match kind {
                                AttemptKind::Primary => {
                                    if backup_fired {
                                        // Backup still running; wait for it.
                                        continue;
                                    }
                                    if let Some(attempt) = backup.take() {
                                        backup_fired = true;
                                        backup_handle =
                                            Some(self.spawn_backup(attempt, tx.clone()));
                                        self.config.event_listeners.emit(&HedgeEvent::BackupStarted {
                                            pattern_name: self.config.name.clone(),
                                            timestamp: Instant::now(),
                                            delay_elapsed: start.elapsed(),
                                        });
                                        continue;
                                    }
                                    break Err(e);
                                }
                                AttemptKind::Backup => {
                                    if primary_done {
                                        break Err(e);
                                    }
                                    // Primary still running; wait for it.
                                }
                            }
                        }
                    }
                }

                () = &mut sleep, if !backup_fired && backup.is_some() => {
                    backup_fired = true;
                    let attempt = backup.take().expect("guarded by backup.is_some()");
                    backup_handle = Some(self.spawn_backup(attempt, tx.clone()));
                    self.config.event_listeners.emit(&HedgeEvent::BackupStarted {
                        pattern_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        delay_elapsed: start.elapsed(),
                    });
                }

                else => {
                    // Every sender was dropped without sending: both
                    // attempt tasks must have panicked before completing.
                    // Account for whichever counters weren't already
                    // cleared by a (never-received) completion so the
                    // active-attempt count doesn't leak.
                    if primary_handle.take().is_some() {
                        self.active_attempts.fetch_sub(1, Ordering::SeqCst);
                    }
                    if backup_handle.take().is_some() {
                        self.active_attempts.fetch_sub(1, Ordering::SeqCst);
                    }
                    break Err(RpcError::Infrastructure {
                        message: HedgeError::AttemptLost.to_string(),
                    });
                }
            }
        };

        if outcome.is_err() {
            self.config.event_listeners.emit(&HedgeEvent::AllFailed {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                attempts: if backup_fired { 2 } else { 1 },
            });
        }

        outcome
    }

    fn spawn_backup(
        &self,
        attempt: Attempt,
        tx: mpsc::Sender<(AttemptKind, Result<Value, RpcError>)>,
    ) -> AttemptHandle {
        self.active_attempts.fetch_add(1, Ordering::SeqCst);
        AttemptHandle(tokio::spawn(async move {
            let result = attempt().await;
            let _ = tx.send((AttemptKind::Backup, result)).await;
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize as AU, Ordering as Ord};
    use std::time::Duration;

    fn ok_after(ms: u64, value: i64) -> Attempt {
        Box::new(move || {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(Value::from(value))
            })
        })
    }

    fn err_after(ms: u64) -> Attempt {
        Box::new(move || {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Err(RpcError::Infrastructure {
                    message: "boom".into(),
                })
            })
        })
    }

    #[tokio::test]
    async fn fast_primary_wins_without_backup_firing() {
        let backup_started = Arc::new(AU::new(0));
        let bs = Arc::clone(&backup_started);
        let manager = HedgedManager::builder()
            .delay(Duration::from_millis(50))
            .on_backup_started(move |_| {
                bs.fetch_add(1, Ord::SeqCst);
            })
            .build();

        let result = manager.run(ok_after(5, 1), Some(ok_after(5, 2))).await;
        assert_eq!(result.unwrap(), Value::from(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(backup_started.load(Ord::SeqCst), 0);
        assert_eq!(manager.active_attempts(), 0);
    }

    #[tokio::test]
    async fn slow_primary_loses_to_backup() {
        let manager = HedgedManager::builder()
            .delay(Duration::from_millis(20))
            .build();

        let result = manager.run(ok_after(500, 1), Some(ok_after(5, 2))).await;
        assert_eq!(result.unwrap(), Value::from(2));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(manager.active_attempts(), 0);
    }

    #[tokio::test]
    async fn primary_failure_fires_backup_immediately() {
        let manager = HedgedManager::builder()
            .delay(Duration::from_secs(10))
            .build();

        let start = Instant::now();
        let result = manager.run(err_after(5), Some(ok_after(5, 9))).await;
        assert_eq!(result.unwrap(), Value::from(9));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn both_fail_returns_error() {
        let manager = HedgedManager::builder()
            .delay(Duration::from_millis(5))
            .build();

        let result = manager.run(err_after(5), Some(err_after(20))).await;
        assert!(result.is_err());
        assert_eq!(manager.active_attempts(), 0);
    }

    #[tokio::test]
    async fn no_backup_degrades_to_primary_only() {
        let manager = HedgedManager::builder().build();
        let result = manager.run(ok_after(5, 42), None).await;
        assert_eq!(result.unwrap(), Value::from(42));
    }
}
