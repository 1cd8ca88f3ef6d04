//! JSON-RPC 2.0 wire types shared by the batch, hedge, and manager paths.
//!
//! Single calls serialize as an object; batches serialize as a JSON array
//! of the same object shape, per the JSON-RPC 2.0 specification. The `id`
//! on a batched request is always the slot's position in the batch (§4.6),
//! and responses are routed back to their slot by matching `id`, never by
//! position in the reply array.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        let params = if params.is_null() { None } else { Some(params) };
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// One JSON-RPC 2.0 response. Exactly one of `result`/`error` is present
/// on a well-formed envelope; both missing or both present is malformed
/// and is treated as an infrastructure error by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

impl JsonRpcResponse {
    /// `true` iff `result` is present and `error` is absent, per §6.
    pub fn is_success(&self) -> bool {
        self.result.is_some() && self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Either a single request/response or a batch of them, mirroring the
/// JSON-RPC 2.0 batch extension (§6 "Requests are either a single object
/// ... or an array of such objects for batch").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcBody<T> {
    Single(T),
    Batch(Vec<T>),
}

/// Deterministic string key for a `(method, params)` pair, used by the
/// request cache and by batch/hedge coalescing.
///
/// JSON object keys are sorted recursively so that two semantically
/// identical parameter objects with differently-ordered keys hash to the
/// same key; array element order is preserved since JSON-RPC positional
/// params are order-significant.
pub fn canonical_params_key(method: &str, params: &Value) -> String {
    let mut buf = String::with_capacity(64);
    buf.push_str(method);
    buf.push(':');
    write_canonical(params, &mut buf);
    buf
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('"');
                out.push_str(k);
                out.push_str("\":");
                write_canonical(&map[*k], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_key_is_stable_under_object_key_reorder() {
        let a = canonical_params_key("getBalance", &json!({"pubkey": "X", "commitment": "confirmed"}));
        let b = canonical_params_key("getBalance", &json!({"commitment": "confirmed", "pubkey": "X"}));
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_key_respects_array_order() {
        let a = canonical_params_key("getBalance", &json!(["X", "confirmed"]));
        let b = canonical_params_key("getBalance", &json!(["confirmed", "X"]));
        assert_ne!(a, b);
    }

    #[test]
    fn canonical_key_distinguishes_methods() {
        let a = canonical_params_key("getBalance", &json!({"pubkey": "X"}));
        let b = canonical_params_key("getSlot", &json!({"pubkey": "X"}));
        assert_ne!(a, b);
    }

    #[test]
    fn response_success_requires_result_and_no_error() {
        let ok: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "result": 42
        }))
        .unwrap();
        assert!(ok.is_success());

        let err: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "boom"}
        }))
        .unwrap();
        assert!(!err.is_success());
    }

    #[test]
    fn batch_body_round_trips() {
        let batch = JsonRpcBody::Batch(vec![
            JsonRpcRequest::new(0, "getSlot", Value::Null),
            JsonRpcRequest::new(1, "getBalance", json!(["X"])),
        ]);
        let s = serde_json::to_string(&batch).unwrap();
        assert!(s.starts_with('['));
    }
}
