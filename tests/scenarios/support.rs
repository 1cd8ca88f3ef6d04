use serde_json::Value;

/// A successful JSON-RPC 2.0 response envelope.
pub(crate) fn jsonrpc_ok(id: u64, result: Value) -> Value {
    serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result})
}
