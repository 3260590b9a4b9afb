//! JSON-RPC 2.0 envelopes and request id generation.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::RpcError;

// Start above 10000 to avoid collisions with hand-selected ids like 1, 2, 42
// or 100 that may already be in use on a shared connection.
static COUNTER: AtomicU64 = AtomicU64::new(10_000);

/// Create a new id for a JSON-RPC request. Multiple calls produce values
/// unique within this process; no persistence across restarts.
pub fn next_request_id() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed) + 1
}

#[derive(Serialize, Debug, Clone)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        JsonRpcRequest {
            jsonrpc: "2.0",
            id: next_request_id(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// The numeric request id this response correlates to, if any.
    pub fn numeric_id(&self) -> Option<u64> {
        match &self.id {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<serde_json::Value, RpcError> {
        if let Some(error) = self.error {
            let message = match error.data {
                Some(data) => format!("{} ({data})", error.message),
                None => error.message,
            };
            return Err(RpcError::JsonRpc {
                code: error.code,
                message,
            });
        }
        self.result.ok_or_else(|| RpcError::InvalidResponse {
            message: "response carries neither result nor error".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_above_hand_picked_values_and_increase() {
        let first = next_request_id();
        let second = next_request_id();
        assert!(first > 10_000);
        assert!(second > first);
    }

    #[test]
    fn request_serialization() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 10_001,
            method: "status".to_owned(),
            params: serde_json::json!({}),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"jsonrpc": "2.0", "id": 10_001, "method": "status", "params": {}})
        );
    }

    #[test]
    fn error_responses_become_errors() {
        let response: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":5,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, RpcError::JsonRpc { code: -32601, .. }));
    }

    #[test]
    fn string_ids_are_matched_numerically() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"10042","result":{}}"#).unwrap();
        assert_eq!(response.numeric_id(), Some(10_042));
    }
}
