//! JSON-RPC batch coordinator.
//!
//! [`BatchManager`] transparently combines multiple pending calls to
//! batchable methods into one JSON-RPC batch request, preserving each
//! call's identity on the response path (§4.6). It never opens a socket
//! itself: a flushed batch is handed to a caller-supplied
//! [`dispatcher::Dispatcher`] closure — the orchestrator's "one HTTPS POST
//! with a JSON array body" path — and the reply is routed back to each
//! slot by matching JSON-RPC `id`, not by position in the array.
//!
//! A batch flushes when either: its slot count reaches `batch_size`, its
//! `batch_window` elapses since the first slot was enqueued, or
//! [`BatchManager::flush`] is called explicitly. A single mutex guards the
//! (active batch, timer handle) pair; flushing detaches the batch under the
//! lock and dispatches outside it, so the next caller's `enqueue` is never
//! blocked on an in-flight HTTP round trip (§5).
//!
//! ```rust,no_run
//! use rpc_resilience_batch::BatchManager;
//! use rpc_resilience_core::wire::JsonRpcResponse;
//! use futures::FutureExt;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), rpc_resilience_batch::BatchError> {
//! let manager = BatchManager::builder()
//!     .batchable_method("getBalance")
//!     .batch_size(8)
//!     .dispatcher(Arc::new(|requests| {
//!         async move {
//!             // Send `requests` as one JSON array POST; here, echo success.
//!             Ok(requests
//!                 .into_iter()
//!                 .map(|r| JsonRpcResponse {
//!                     jsonrpc: "2.0".into(),
//!                     id: r.id,
//!                     result: Some(serde_json::json!(null)),
//!                     error: None,
//!                 })
//!                 .collect())
//!         }
//!         .boxed()
//!     }))
//!     .build()?;
//!
//! let result = manager.enqueue("getBalance", serde_json::json!(["X"])).await;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

mod config;
pub mod dispatcher;
mod error;
mod events;

pub use config::{BatchConfig, BatchConfigBuilder};
pub use dispatcher::Dispatcher;
pub use error::BatchError;
pub use events::{BatchEvent, FlushTrigger};

use rpc_resilience_core::wire::JsonRpcRequest;
use rpc_resilience_core::RpcError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::oneshot;

#[cfg(feature = "metrics")]
use metrics::{counter, histogram};

struct BatchSlot {
    method: String,
    params: Value,
    responder: oneshot::Sender<Result<Value, RpcError>>,
}

struct ActiveBatch {
    generation: u64,
    slots: Vec<BatchSlot>,
    timer: Option<tokio::task::JoinHandle<()>>,
}

impl ActiveBatch {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            slots: Vec::new(),
            timer: None,
        }
    }
}

struct BatchState {
    active: Option<ActiveBatch>,
}

/// Coordinates batching of calls to whitelisted JSON-RPC methods.
///
/// Cheap to clone; clones share the same active batch and pending count.
#[derive(Clone)]
pub struct BatchManager {
    config: Arc<BatchConfig>,
    state: Arc<Mutex<BatchState>>,
    next_generation: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
}

impl BatchManager {
    pub(crate) fn new(config: BatchConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BatchState { active: None })),
            next_generation: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a builder with defaults; see [`BatchConfigBuilder`].
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::new()
    }

    /// Returns `true` if `method` is in the batchable whitelist. The
    /// orchestrator uses this at its routing step (§4.8 step 4); this crate
    /// does not enforce it in [`BatchManager::enqueue`] itself.
    pub fn is_batchable(&self, method: &str) -> bool {
        self.config.batchable_methods.contains(method)
    }

    /// The configured maximum slot count per batch.
    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Number of slots enqueued but not yet resolved, across the active
    /// batch and any batch currently being dispatched.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Adds `(method, params)` to the currently accumulating batch and
    /// awaits its routed response.
    ///
    /// Fails immediately with [`RpcError::BatchQueueFull`] without adding
    /// anything if `max_queue_size` pending slots are already outstanding;
    /// the caller should fall back to direct dispatch (§4.6
    /// "Backpressure").
    pub async fn enqueue(&self, method: impl Into<String>, params: Value) -> Result<Value, RpcError> {
        let method = method.into();

        if self.pending.load(Ordering::SeqCst) >= self.config.max_queue_size {
            self.config.event_listeners.emit(&BatchEvent::QueueFull {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
            });
            #[cfg(feature = "metrics")]
            counter!("rpc_batch_queue_full_total", "batch" => self.config.name.clone()).increment(1);
            return Err(RpcError::BatchQueueFull);
        }
        self.pending.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        let slot = BatchSlot {
            method: method.clone(),
            params,
            responder: tx,
        };

        let immediate_batch = {
            let mut state = self.state.lock().unwrap();
            if state.active.is_none() {
                let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
                state.active = Some(ActiveBatch::new(generation));
            }
            let active = state.active.as_mut().expect("just inserted if absent");
            active.slots.push(slot);

            let depth = active.slots.len();
            self.config.event_listeners.emit(&BatchEvent::Enqueued {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                method,
                queue_depth: depth,
            });

            if depth >= self.config.batch_size {
                state.active.take()
            } else {
                if depth == 1 {
                    let this = self.clone();
                    let window = self.config.batch_window;
                    let generation = active.generation;
                    active.timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(window).await;
                        this.flush_if_current(generation, FlushTrigger::WindowElapsed).await;
                    }));
                }
                None
            }
        };

        if let Some(batch) = immediate_batch {
            self.dispatch_batch(batch, FlushTrigger::SizeReached).await;
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Infrastructure {
                message: BatchError::SlotLost.to_string(),
            }),
        }
    }

    /// Forces the currently accumulating batch (if any) to flush now,
    /// without waiting for `batch_size` or `batch_window`.
    pub async fn flush(&self) {
        let batch = {
            let mut state = self.state.lock().unwrap();
            state.active.take()
        };
        if let Some(batch) = batch {
            self.dispatch_batch(batch, FlushTrigger::Explicit).await;
        }
    }

    async fn flush_if_current(&self, generation: u64, trigger: FlushTrigger) {
        let batch = {
            let mut state = self.state.lock().unwrap();
            match &state.active {
                Some(b) if b.generation == generation => state.active.take(),
                _ => None,
            }
        };
        if let Some(batch) = batch {
            self.dispatch_batch(batch, trigger).await;
        }
    }

    async fn dispatch_batch(&self, mut batch: ActiveBatch, trigger: FlushTrigger) {
        if let Some(handle) = batch.timer.take() {
            handle.abort();
        }

        let slot_count = batch.slots.len();
        self.config.event_listeners.emit(&BatchEvent::Flushed {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
            slot_count,
            trigger,
        });
        #[cfg(feature = "metrics")]
        {
            counter!("rpc_batch_flushes_total", "batch" => self.config.name.clone()).increment(1);
            histogram!("rpc_batch_slot_count", "batch" => self.config.name.clone()).record(slot_count as f64);
        }

        let requests: Vec<JsonRpcRequest> = batch
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| JsonRpcRequest::new(i as u64, slot.method.clone(), slot.params.clone()))
            .collect();

        let dispatcher = self
            .config
            .dispatcher
            .clone()
            .expect("build() guarantees a dispatcher is configured");
        let outcome = dispatcher(requests).await;

        match outcome {
            Ok(responses) => {
                let mut by_id: HashMap<u64, rpc_resilience_core::wire::JsonRpcResponse> =
                    responses.into_iter().map(|r| (r.id, r)).collect();

                for (i, slot) in batch.slots.into_iter().enumerate() {
                    let id = i as u64;
                    let result = match by_id.remove(&id) {
                        Some(resp) if resp.is_success() => {
                            Ok(resp.result.expect("is_success guarantees result is Some"))
                        }
                        Some(resp) => Err(resp
                            .error
                            .map(|e| RpcError::Application {
                                code: e.code,
                                message: e.message,
                            })
                            .unwrap_or(RpcError::BatchResponseMissing)),
                        None => {
                            self.config.event_listeners.emit(&BatchEvent::ResponseMissing {
                                pattern_name: self.config.name.clone(),
                                timestamp: Instant::now(),
                                id,
                            });
                            Err(RpcError::BatchResponseMissing)
                        }
                    };
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    let _ = slot.responder.send(result);
                }
            }
            Err(e) => {
                for slot in batch.slots {
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    let _ = slot.responder.send(Err(e.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use rpc_resilience_core::wire::JsonRpcResponse;
    use std::sync::atomic::AtomicUsize as AU;
    use std::time::Duration;

    fn counting_dispatcher(calls: Arc<AU>, reverse: bool) -> Dispatcher {
        Arc::new(move |requests: Vec<JsonRpcRequest>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let mut responses: Vec<JsonRpcResponse> = requests
                    .iter()
                    .map(|r| JsonRpcResponse {
                        jsonrpc: "2.0".into(),
                        id: r.id,
                        result: Some(Value::from(r.id)),
                        error: None,
                    })
                    .collect();
                if reverse {
                    responses.reverse();
                }
                Ok(responses)
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn flushes_when_batch_size_reached() {
        let calls = Arc::new(AU::new(0));
        let manager = BatchManager::builder()
            .batchable_method("getBalance")
            .batch_size(3)
            .batch_window(Duration::from_secs(60))
            .dispatcher(counting_dispatcher(Arc::clone(&calls), false))
            .build()
            .unwrap();

        let m = manager.clone();
        let a = tokio::spawn(async move { m.enqueue("getBalance", Value::from(0)).await });
        let m = manager.clone();
        let b = tokio::spawn(async move { m.enqueue("getBalance", Value::from(1)).await });
        let m = manager.clone();
        let c = tokio::spawn(async move { m.enqueue("getBalance", Value::from(2)).await });

        assert_eq!(a.await.unwrap().unwrap(), Value::from(0));
        assert_eq!(b.await.unwrap().unwrap(), Value::from(1));
        assert_eq!(c.await.unwrap().unwrap(), Value::from(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn flushes_on_window_timeout_with_fewer_than_batch_size_slots() {
        let calls = Arc::new(AU::new(0));
        let manager = BatchManager::builder()
            .batch_size(8)
            .batch_window(Duration::from_millis(30))
            .dispatcher(counting_dispatcher(Arc::clone(&calls), false))
            .build()
            .unwrap();

        let result = manager.enqueue("getSlot", Value::Null).await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn routes_out_of_order_responses_by_id_not_position() {
        let calls = Arc::new(AU::new(0));
        let manager = BatchManager::builder()
            .batch_size(3)
            .batch_window(Duration::from_secs(60))
            .dispatcher(counting_dispatcher(Arc::clone(&calls), true))
            .build()
            .unwrap();

        let m = manager.clone();
        let a = tokio::spawn(async move { m.enqueue("m", Value::from("A")).await });
        let m = manager.clone();
        let b = tokio::spawn(async move { m.enqueue("m", Value::from("B")).await });
        let m = manager.clone();
        let c = tokio::spawn(async move { m.enqueue("m", Value::from("C")).await });

        // The dispatcher reverses the reply array, but each result value
        // mirrors its own request id, so every caller must still get back
        // a value equal to whatever id its slot was assigned, regardless of
        // wire order — not, e.g., the array-reversed neighbor's id.
        let mut results = vec![
            a.await.unwrap().unwrap(),
            b.await.unwrap().unwrap(),
            c.await.unwrap().unwrap(),
        ];
        results.sort_by_key(|v| v.as_u64().unwrap());
        assert_eq!(results, vec![Value::from(0), Value::from(1), Value::from(2)]);
    }

    #[tokio::test]
    async fn missing_response_for_a_slot_fails_only_that_slot() {
        let dispatcher: Dispatcher = Arc::new(|requests: Vec<JsonRpcRequest>| {
            async move {
                // Drop the response for id 1; return the rest.
                Ok(requests
                    .into_iter()
                    .filter(|r| r.id != 1)
                    .map(|r| JsonRpcResponse {
                        jsonrpc: "2.0".into(),
                        id: r.id,
                        result: Some(Value::from(r.id)),
                        error: None,
                    })
                    .collect())
            }
            .boxed()
        });

        let manager = BatchManager::builder()
            .batch_size(3)
            .batch_window(Duration::from_secs(60))
            .dispatcher(dispatcher)
            .build()
            .unwrap();

        let m = manager.clone();
        let a = tokio::spawn(async move { m.enqueue("m", Value::Null).await });
        let m = manager.clone();
        let b = tokio::spawn(async move { m.enqueue("m", Value::Null).await });
        let m = manager.clone();
        let c = tokio::spawn(async move { m.enqueue("m", Value::Null).await });

        assert!(a.await.unwrap().is_ok());
        assert!(matches!(
            b.await.unwrap().unwrap_err(),
            RpcError::BatchResponseMissing
        ));
        assert!(c.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn dispatcher_failure_fails_every_slot_in_the_batch() {
        let dispatcher: Dispatcher = Arc::new(|_requests| {
            async {
                Err(RpcError::Infrastructure {
                    message: "connection refused".into(),
                })
            }
            .boxed()
        });

        let manager = BatchManager::builder()
            .batch_size(2)
            .batch_window(Duration::from_secs(60))
            .dispatcher(dispatcher)
            .build()
            .unwrap();

        let m = manager.clone();
        let a = tokio::spawn(async move { m.enqueue("m", Value::Null).await });
        let m = manager.clone();
        let b = tokio::spawn(async move { m.enqueue("m", Value::Null).await });

        assert!(a.await.unwrap().is_err());
        assert!(b.await.unwrap().is_err());
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test]
    async fn queue_full_rejects_new_enqueues() {
        let manager = BatchManager::builder()
            .batch_size(100)
            .batch_window(Duration::from_secs(60))
            .max_queue_size(1)
            .dispatcher(counting_dispatcher(Arc::new(AU::new(0)), false))
            .build()
            .unwrap();

        let m = manager.clone();
        let _first = tokio::spawn(async move { m.enqueue("m", Value::Null).await });
        tokio::task::yield_now().await;

        let err = manager.enqueue("m", Value::Null).await.unwrap_err();
        assert!(matches!(err, RpcError::BatchQueueFull));
    }

    #[tokio::test]
    async fn explicit_flush_dispatches_a_partial_batch() {
        let calls = Arc::new(AU::new(0));
        let manager = BatchManager::builder()
            .batch_size(100)
            .batch_window(Duration::from_secs(60))
            .dispatcher(counting_dispatcher(Arc::clone(&calls), false))
            .build()
            .unwrap();

        let m = manager.clone();
        let pending = tokio::spawn(async move { m.enqueue("m", Value::Null).await });
        tokio::task::yield_now().await;

        manager.flush().await;
        assert!(pending.await.unwrap().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
