//! Configuration for the endpoint selector.

use crate::events::EndpointEvent;
use rpc_resilience_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for [`crate::EndpointSelector`].
pub struct EndpointSelectorConfig {
    pub(crate) urls: Vec<String>,
    pub(crate) max_failures: u32,
    pub(crate) health_check_interval: Duration,
    pub(crate) event_listeners: EventListeners<EndpointEvent>,
    pub(crate) name: String,
}

impl EndpointSelectorConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> EndpointSelectorConfigBuilder {
        EndpointSelectorConfigBuilder::new()
    }
}

/// Builder for [`EndpointSelectorConfig`].
pub struct EndpointSelectorConfigBuilder {
    urls: Vec<String>,
    max_failures: u32,
    health_check_interval: Duration,
    event_listeners: EventListeners<EndpointEvent>,
    name: String,
}

impl EndpointSelectorConfigBuilder {
    /// Creates a new builder with default values.
    ///
    /// Defaults match §4.4: 3 consecutive failures to quarantine, 30s
    /// cooldown before an endpoint is offered as a probe again.
    pub fn new() -> Self {
        Self {
            urls: Vec::new(),
            max_failures: 3,
            health_check_interval: Duration::from_secs(30),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Adds one endpoint URL to the pool.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    /// Sets the full set of endpoint URLs, replacing any added so far.
    pub fn endpoints<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the number of consecutive failures before an endpoint is
    /// quarantined.
    ///
    /// Default: 3
    pub fn max_failures(mut self, n: u32) -> Self {
        self.max_failures = n;
        self
    }

    /// Sets how long a quarantined endpoint waits before being offered
    /// again as a probe.
    ///
    /// Default: 30s
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Sets the name of this selector instance for observability.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when an endpoint is quarantined.
    pub fn on_quarantined<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let EndpointEvent::Quarantined {
                endpoint_id, url, ..
            } = event
            {
                f(*endpoint_id, url);
            }
        }));
        self
    }

    /// Registers a callback invoked when a quarantined endpoint recovers.
    pub fn on_recovered<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let EndpointEvent::Recovered {
                endpoint_id, url, ..
            } = event
            {
                f(*endpoint_id, url);
            }
        }));
        self
    }

    /// Builds the endpoint selector.
    ///
    /// Panics if no endpoint URLs were added; an orchestrator with zero
    /// upstreams is a configuration error, not a runtime one.
    pub fn build(self) -> crate::EndpointSelector {
        assert!(
            !self.urls.is_empty(),
            "EndpointSelector requires at least one endpoint URL"
        );
        let config = EndpointSelectorConfig {
            urls: self.urls,
            max_failures: self.max_failures,
            health_check_interval: self.health_check_interval,
            event_listeners: self.event_listeners,
            name: self.name,
        };
        crate::EndpointSelector::new(config)
    }
}

impl Default for EndpointSelectorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
