//! Error types for the conformance harness

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::RpcError;

/// Failure to turn raw response bytes into an inbound envelope
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Body was not valid JSON
    #[error("Response body is not valid JSON: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Body was JSON but not an object
    #[error("Response body is not a JSON object")]
    NotAnObject,

    /// Neither `result` nor `error` was present
    #[error("Response envelope carries neither 'result' nor 'error'")]
    MissingOutcome,

    /// Both `result` and `error` were present
    #[error("Response envelope carries both 'result' and 'error'")]
    AmbiguousOutcome,
}

/// Transport-level fault: the request never produced a usable envelope
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout, ...
    #[error("HTTP request to '{endpoint}' failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success HTTP status
    #[error("HTTP status {status} from '{endpoint}': {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Body could not be decoded into an envelope
    #[error("Malformed response body: {0}")]
    Decode(#[from] DecodeError),
}

impl TransportError {
    /// Whether the underlying fault was a request timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Http { source, .. } if source.is_timeout())
    }

    /// Whether the server could not be reached at all
    pub fn is_connect(&self) -> bool {
        matches!(self, TransportError::Http { source, .. } if source.is_connect())
    }
}

/// Handshake failure
#[derive(Error, Debug)]
pub enum InitError {
    /// Handshake never produced an envelope
    #[error("Handshake transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Server answered the handshake with an `error` envelope
    #[error("Handshake rejected: {0}")]
    Rejected(RpcError),

    /// Server answered with a `result` lacking `protocolVersion`
    #[error("Handshake result has no 'protocolVersion'")]
    MissingProtocolVersion,
}

/// Failure of a single request issued through the session
#[derive(Error, Debug)]
pub enum CallError {
    /// The lazy handshake that gates every call failed
    #[error(transparent)]
    Init(#[from] InitError),

    /// Network, HTTP or body decoding fault
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request reached the service and was rejected
    #[error("Application error: {0}")]
    Application(RpcError),
}

impl CallError {
    /// Classify this error into the coarse kind reported per step
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Transport(_) | CallError::Init(InitError::Transport(_)) => {
                ErrorKind::Transport
            }
            CallError::Application(_) | CallError::Init(InitError::Rejected(_)) => {
                ErrorKind::Application
            }
            CallError::Init(InitError::MissingProtocolVersion) => ErrorKind::Assertion,
        }
    }

    /// The RPC error object, when the service rejected the request
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            CallError::Application(err) | CallError::Init(InitError::Rejected(err)) => Some(err),
            _ => None,
        }
    }
}

/// Coarse classification of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Never reached the service
    Transport,
    /// Reached the service, request rejected
    Application,
    /// Reached the service, response had the wrong shape
    Assertion,
}

/// Failure of the second decode pass over a successful result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    /// A required field is absent or has the wrong JSON type
    #[error("Missing or mistyped field '{field}'")]
    MissingField { field: String },

    /// The nested text is not valid JSON
    #[error("Nested payload in '{field}' is not valid JSON: {reason}")]
    NestedJson { field: String, reason: String },

    /// The result does not have the expected structure
    #[error("Unexpected result shape: {details}")]
    Shape { details: String },

    /// A declared count disagrees with the sequence it describes
    #[error("'{count_field}' is {declared} but '{items_field}' holds {actual} entries")]
    CountMismatch {
        count_field: String,
        items_field: String,
        declared: u64,
        actual: usize,
    },
}

impl PayloadError {
    /// Create a missing field error
    pub fn missing<S: Into<String>>(field: S) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a shape error
    pub fn shape<S: Into<String>>(details: S) -> Self {
        Self::Shape {
            details: details.into(),
        }
    }
}

/// Invalid harness configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value failed validation
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    /// Create a validation error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}
