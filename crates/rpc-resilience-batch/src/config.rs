//! Configuration for the batch manager.

use crate::dispatcher::Dispatcher;
use crate::error::BatchError;
use crate::events::BatchEvent;
use rpc_resilience_core::events::{EventListeners, FnListener};
use std::collections::HashSet;
use std::time::Duration;

/// Configuration for [`crate::BatchManager`].
pub struct BatchConfig {
    pub(crate) batchable_methods: HashSet<String>,
    pub(crate) batch_size: usize,
    pub(crate) batch_window: Duration,
    pub(crate) max_queue_size: usize,
    pub(crate) dispatcher: Option<Dispatcher>,
    pub(crate) event_listeners: EventListeners<BatchEvent>,
    pub(crate) name: String,
}

impl BatchConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::new()
    }
}

/// Builder for [`BatchConfig`].
pub struct BatchConfigBuilder {
    batchable_methods: HashSet<String>,
    batch_size: usize,
    batch_window: Duration,
    max_queue_size: usize,
    dispatcher: Option<Dispatcher>,
    event_listeners: EventListeners<BatchEvent>,
    name: String,
}

impl BatchConfigBuilder {
    /// Creates a new builder with default values.
    ///
    /// Defaults match §4.6: `batch_size` 8, `batch_window_ms` 100, and an
    /// empty method whitelist (nothing batches until
    /// [`BatchConfigBuilder::batchable_method`] is called).
    pub fn new() -> Self {
        Self {
            batchable_methods: HashSet::new(),
            batch_size: 8,
            batch_window: Duration::from_millis(100),
            max_queue_size: 1000,
            dispatcher: None,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Adds a method to the batchable whitelist.
    pub fn batchable_method(mut self, method: impl Into<String>) -> Self {
        self.batchable_methods.insert(method.into());
        self
    }

    /// Adds every method in `methods` to the batchable whitelist.
    pub fn batchable_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.batchable_methods.extend(methods.into_iter().map(Into::into));
        self
    }

    /// Sets the maximum number of slots in one batch before it is forced
    /// to flush.
    ///
    /// Default: 8
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets how long the window waits, from the first slot enqueued, before
    /// forcing a flush.
    ///
    /// Default: 100ms
    pub fn batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }

    /// Sets the maximum number of slots that may be pending (enqueued but
    /// not yet resolved) at once before `enqueue` rejects new calls with
    /// `BATCH_QUEUE_FULL`.
    ///
    /// Default: 1000
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Sets the dispatcher used to send a frozen batch over the wire.
    /// Required; [`BatchConfigBuilder::build`] fails without one.
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Sets the name of this batch manager instance for observability.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a batch is flushed.
    pub fn on_flush<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BatchEvent::Flushed { slot_count, .. } = event {
                f(*slot_count);
            }
        }));
        self
    }

    /// Registers a callback invoked when `enqueue` is rejected because the
    /// pending-slot queue is full.
    pub fn on_queue_full<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, BatchEvent::QueueFull { .. }) {
                f();
            }
        }));
        self
    }

    /// Builds the batch manager.
    ///
    /// Fails with [`BatchError::NoDispatcher`] if no dispatcher was
    /// configured.
    pub fn build(self) -> Result<crate::BatchManager, BatchError> {
        let dispatcher = self.dispatcher.clone().ok_or(BatchError::NoDispatcher)?;
        let config = BatchConfig {
            batchable_methods: self.batchable_methods,
            batch_size: self.batch_size.max(1),
            batch_window: self.batch_window,
            max_queue_size: self.max_queue_size,
            dispatcher: Some(dispatcher),
            event_listeners: self.event_listeners,
            name: self.name,
        };
        Ok(crate::BatchManager::new(config))
    }
}

impl Default for BatchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
