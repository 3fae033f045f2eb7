//! JSON-RPC 2.0 envelope codec
//!
//! Requests are strictly sequential and never pipelined, so every outbound
//! envelope carries the same request id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::DecodeError;

/// JSON-RPC version stamped on every outbound envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Request id used for every outbound envelope
pub const REQUEST_ID: i64 = 1;

/// Code reported for an error object that carries no integer `code`
pub const UNKNOWN_ERROR_CODE: i64 = 0;

/// Outbound JSON-RPC request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID
    pub id: i64,
    /// Request method name
    pub method: String,
    /// Request parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Create an error object without data
    pub fn new<S: Into<String>>(code: i64, message: S) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Either half of an inbound envelope; exactly one is ever present
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Successful result mapping
    Result(Value),
    /// Error object
    Error(RpcError),
}

/// Inbound JSON-RPC response
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    /// JSON-RPC version as sent by the server
    pub jsonrpc: Option<String>,
    /// Request ID echoed by the server
    pub id: Value,
    /// Result or error
    pub outcome: Outcome,
}

impl ResponseEnvelope {
    /// The error object, if the envelope carries one
    pub fn error(&self) -> Option<&RpcError> {
        match &self.outcome {
            Outcome::Error(err) => Some(err),
            Outcome::Result(_) => None,
        }
    }

    /// Consume the envelope, turning an error object into `Err`
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.outcome {
            Outcome::Result(value) => Ok(value),
            Outcome::Error(err) => Err(err),
        }
    }
}

/// Build an outbound envelope
pub fn encode(method: &str, params: Option<Map<String, Value>>) -> RequestEnvelope {
    RequestEnvelope {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: REQUEST_ID,
        method: method.to_string(),
        params,
    }
}

/// Parse raw response bytes into an inbound envelope
pub fn decode(raw: &[u8]) -> Result<ResponseEnvelope, DecodeError> {
    let value: Value = serde_json::from_slice(raw)?;
    let Value::Object(mut object) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let result = object.remove("result");
    let error = object.remove("error");

    let outcome = match (result, error) {
        (Some(_), Some(_)) => return Err(DecodeError::AmbiguousOutcome),
        (None, None) => return Err(DecodeError::MissingOutcome),
        (Some(result), None) => Outcome::Result(result),
        (None, Some(error)) => Outcome::Error(error_object(error)?),
    };

    Ok(ResponseEnvelope {
        jsonrpc: object
            .remove("jsonrpc")
            .and_then(|v| v.as_str().map(str::to_string)),
        id: object.remove("id").unwrap_or(Value::Null),
        outcome,
    })
}

/// An error mapping with a missing or mistyped member is still a rejection
fn error_object(error: Value) -> Result<RpcError, DecodeError> {
    match serde_json::from_value::<RpcError>(error.clone()) {
        Ok(err) => Ok(err),
        Err(_) if error.is_object() => Ok(RpcError {
            code: error
                .get("code")
                .and_then(Value::as_i64)
                .unwrap_or(UNKNOWN_ERROR_CODE),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
            data: error.get("data").cloned(),
        }),
        Err(source) => Err(source.into()),
    }
}
