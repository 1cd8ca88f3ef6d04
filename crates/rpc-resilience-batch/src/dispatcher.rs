//! The dispatcher seam: how a frozen batch actually reaches the wire.
//!
//! [`crate::BatchManager`] never opens a socket itself. It hands a frozen
//! batch's requests to a caller-supplied [`Dispatcher`] closure — the
//! orchestrator's "single HTTPS POST with a JSON array body" path (§4.6) —
//! and routes whatever comes back to the originating slots. This mirrors
//! the hedge manager's `Attempt` closure seam: the component races/batches,
//! the orchestrator supplies the actual connect-and-send behavior.

use futures::future::BoxFuture;
use rpc_resilience_core::wire::{JsonRpcRequest, JsonRpcResponse};
use rpc_resilience_core::RpcError;
use std::sync::Arc;

/// Sends one JSON-RPC batch request (a JSON array body) and returns the
/// upstream's array of responses, or an infrastructure error if the whole
/// batch failed to dispatch (connection refused, timeout, non-2xx, ...).
///
/// A successful return may still be missing responses for some `id`s; the
/// batch manager routes those slots to [`RpcError::BatchResponseMissing`].
pub type Dispatcher =
    Arc<dyn Fn(Vec<JsonRpcRequest>) -> BoxFuture<'static, Result<Vec<JsonRpcResponse>, RpcError>> + Send + Sync>;
