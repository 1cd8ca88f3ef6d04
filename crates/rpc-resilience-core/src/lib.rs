//! Shared infrastructure for the `rpc-resilience` transport crates.
//!
//! Every component crate in this workspace (token bucket, circuit breaker,
//! connection pool, endpoint selector, cache, batch manager, hedge manager)
//! depends on this crate for three things:
//!
//! - [`error::RpcError`], the unified error taxonomy surfaced to callers.
//! - [`events`], a small pub/sub system used for observability hooks.
//! - [`wire`], the JSON-RPC 2.0 envelope types shared by the batch and
//!   hedge paths and the orchestrator's HTTP dispatch.
//!
//! Components do not depend on the orchestrator crate; the dependency
//! graph is one-way; `rpc-resilience-manager` depends on all of these,
//! never the reverse.

pub mod error;
pub mod events;
pub mod health;
pub mod wire;

pub use error::RpcError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use health::{HealthTriggerable, SharedHealthTrigger, TriggerHealth};
pub use wire::{JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse, canonical_params_key};
