//! Events emitted by the endpoint selector.

use rpc_resilience_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted while selecting endpoints and tracking their health.
#[derive(Debug, Clone)]
pub enum EndpointEvent {
    /// An endpoint was chosen for dispatch.
    Selected {
        pattern_name: String,
        timestamp: Instant,
        endpoint_id: usize,
        url: String,
        was_probe: bool,
    },
    /// An endpoint's consecutive-failure count crossed `max_failures` and
    /// it is now excluded from round-robin selection until
    /// `health_check_interval` elapses.
    Quarantined {
        pattern_name: String,
        timestamp: Instant,
        endpoint_id: usize,
        url: String,
        consecutive_failures: u32,
    },
    /// A quarantined endpoint recorded a success and rejoined the healthy
    /// set.
    Recovered {
        pattern_name: String,
        timestamp: Instant,
        endpoint_id: usize,
        url: String,
    },
    /// Every endpoint is quarantined and none has reached
    /// `health_check_interval` yet, so selection failed outright.
    AllQuarantined {
        pattern_name: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for EndpointEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EndpointEvent::Selected { .. } => "selected",
            EndpointEvent::Quarantined { .. } => "quarantined",
            EndpointEvent::Recovered { .. } => "recovered",
            EndpointEvent::AllQuarantined { .. } => "all_quarantined",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            EndpointEvent::Selected { timestamp, .. } => *timestamp,
            EndpointEvent::Quarantined { timestamp, .. } => *timestamp,
            EndpointEvent::Recovered { timestamp, .. } => *timestamp,
            EndpointEvent::AllQuarantined { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            EndpointEvent::Selected { pattern_name, .. } => pattern_name,
            EndpointEvent::Quarantined { pattern_name, .. } => pattern_name,
            EndpointEvent::Recovered { pattern_name, .. } => pattern_name,
            EndpointEvent::AllQuarantined { pattern_name, .. } => pattern_name,
        }
    }
}
