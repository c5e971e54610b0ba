// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 packet forms and validation.

use serde_json::{json, Map, Value};
use tracing::warn;

// JSON-RPC 2.0 error codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid request")
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: message.into(),
            data: None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("code".to_string(), json!(self.code));
        object.insert("message".to_string(), json!(self.message));
        if let Some(data) = &self.data {
            object.insert("data".to_string(), data.clone());
        }
        Value::Object(object)
    }

    fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            code: object.get("code")?.as_i64()?,
            message: object.get("message")?.as_str()?.to_string(),
            data: object.get("data").cloned(),
        })
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Validation mode for incoming packets.
///
/// Strict mode rejects unknown top-level keys; loose mode warns and
/// carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    Strict,
    #[default]
    Loose,
}

/// One decoded JSON-RPC packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Result {
        id: Value,
        result: Value,
    },
    Error {
        id: Value,
        error: RpcError,
    },
}

const KNOWN_KEYS: &[&str] = &["jsonrpc", "id", "method", "params", "result", "error"];

/// Decode a wire payload into packets.
///
/// Batch arrays are accepted and processed element-wise; each element
/// validates independently. Unparsable JSON fails the whole payload
/// with `PARSE_ERROR`.
pub fn decode(bytes: &[u8], strictness: Strictness) -> Result<Vec<Result<Packet, RpcError>>, RpcError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|_| RpcError::parse_error())?;

    match value {
        Value::Array(elements) => {
            if elements.is_empty() {
                return Err(RpcError::invalid_request());
            }
            Ok(elements
                .iter()
                .map(|element| decode_value(element, strictness))
                .collect())
        }
        other => Ok(vec![decode_value(&other, strictness)]),
    }
}

/// Decode a single JSON value into a packet.
pub fn decode_value(value: &Value, strictness: Strictness) -> Result<Packet, RpcError> {
    let object = value.as_object().ok_or_else(RpcError::invalid_request)?;

    for key in object.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            match strictness {
                Strictness::Strict => return Err(RpcError::invalid_request()),
                Strictness::Loose => warn!(key, "ignoring unknown json-rpc member"),
            }
        }
    }

    if let Some(version) = object.get("jsonrpc") {
        if version != "2.0" {
            return Err(RpcError::invalid_request());
        }
    }

    let id = object.get("id");
    if let Some(id) = id {
        if !(id.is_string() || id.is_number() || id.is_null()) {
            return Err(RpcError::invalid_request());
        }
    }

    if let Some(method) = object.get("method") {
        let method = method.as_str().ok_or_else(RpcError::invalid_request)?;
        if object.contains_key("result") || object.contains_key("error") {
            return Err(RpcError::invalid_request());
        }
        let params = object.get("params").cloned();
        if let Some(params) = &params {
            if !(params.is_object() || params.is_array()) {
                return Err(RpcError::invalid_request());
            }
        }
        return Ok(match id {
            Some(id) => Packet::Request {
                id: id.clone(),
                method: method.to_string(),
                params,
            },
            None => Packet::Notification {
                method: method.to_string(),
                params,
            },
        });
    }

    // Response forms require an id and exactly one of result/error.
    let id = id.cloned().ok_or_else(RpcError::invalid_request)?;
    match (object.get("result"), object.get("error")) {
        (Some(result), None) => Ok(Packet::Result {
            id,
            result: result.clone(),
        }),
        (None, Some(error)) => {
            let error = RpcError::from_json(error).ok_or_else(RpcError::invalid_request)?;
            Ok(Packet::Error { id, error })
        }
        _ => Err(RpcError::invalid_request()),
    }
}

/// Build a request packet.
pub fn request(id: u64, method: &str, params: Option<Value>) -> Value {
    let mut object = Map::new();
    object.insert("jsonrpc".to_string(), json!("2.0"));
    object.insert("id".to_string(), json!(id));
    object.insert("method".to_string(), json!(method));
    if let Some(params) = params {
        object.insert("params".to_string(), params);
    }
    Value::Object(object)
}

/// Build a notification packet.
pub fn notification(method: &str, params: Option<Value>) -> Value {
    let mut object = Map::new();
    object.insert("jsonrpc".to_string(), json!("2.0"));
    object.insert("method".to_string(), json!(method));
    if let Some(params) = params {
        object.insert("params".to_string(), params);
    }
    Value::Object(object)
}

/// Build a success response.
pub fn result_response(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// Build an error response. `id` is null when the failing packet's id
/// could not be determined.
pub fn error_response(id: Option<&Value>, error: &RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id.cloned().unwrap_or(Value::Null),
        "error": error.to_json(),
    })
}

#[cfg(test)]
#[path = "rpc_message_tests.rs"]
mod tests;
