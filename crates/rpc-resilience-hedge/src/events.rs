//! Events emitted by the hedged-request manager.

use rpc_resilience_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted while racing a primary attempt against an optional
/// backup attempt to a different endpoint (§4.7).
#[derive(Debug, Clone)]
pub enum HedgeEvent {
    /// The primary attempt was dispatched.
    PrimaryStarted {
        pattern_name: String,
        timestamp: Instant,
    },
    /// The backup attempt was dispatched, either because `hedge_delay`
    /// elapsed without the primary completing, or because the primary
    /// failed before the delay elapsed and no further waiting was useful.
    BackupStarted {
        pattern_name: String,
        timestamp: Instant,
        delay_elapsed: Duration,
    },
    /// The primary attempt won the race.
    PrimaryWon {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
        backup_was_running: bool,
    },
    /// The backup attempt won the race; the primary's eventual response,
    /// if any, is discarded.
    BackupWon {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// Every dispatched attempt failed.
    AllFailed {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
}

impl ResilienceEvent for HedgeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            HedgeEvent::PrimaryStarted { .. } => "primary_started",
            HedgeEvent::BackupStarted { .. } => "backup_started",
            HedgeEvent::PrimaryWon { .. } => "primary_won",
            HedgeEvent::BackupWon { .. } => "backup_won",
            HedgeEvent::AllFailed { .. } => "all_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            HedgeEvent::PrimaryStarted { timestamp, .. } => *timestamp,
            HedgeEvent::BackupStarted { timestamp, .. } => *timestamp,
            HedgeEvent::PrimaryWon { timestamp, .. } => *timestamp,
            HedgeEvent::BackupWon { timestamp, .. } => *timestamp,
            HedgeEvent::AllFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            HedgeEvent::PrimaryStarted { pattern_name, .. } => pattern_name,
            HedgeEvent::BackupStarted { pattern_name, .. } => pattern_name,
            HedgeEvent::PrimaryWon { pattern_name, .. } => pattern_name,
            HedgeEvent::BackupWon { pattern_name, .. } => pattern_name,
            HedgeEvent::AllFailed { pattern_name, .. } => pattern_name,
        }
    }
}
