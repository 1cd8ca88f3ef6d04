//! Property-based tests for the quantified invariants in the transport's
//! testable-properties list: the token bucket never over- or
//! under-commits, the cache round-trips within its TTL, and every call
//! through the orchestrator resolves to either success or failure, never
//! both or neither.

mod property;
