//! HTTP session client with a lazily performed handshake

use reqwest::header::{ACCEPT, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::envelope::{self, ResponseEnvelope};
use crate::error::{CallError, InitError, TransportError};
use crate::{DEFAULT_PROTOCOL_VERSION, DEFAULT_TIMEOUT_SECONDS};

/// Handshake method name
pub const INITIALIZE_METHOD: &str = "initialize";

/// Header a streamable HTTP server may use to pin a session
pub const SESSION_ID_HEADER: &str = "Mcp-Session-Id";

/// Client or server identity exchanged during the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name
    pub name: String,
    /// Implementation version
    pub version: String,
}

/// Capability set declared by the server in its handshake result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerCapabilities(BTreeMap<String, Value>);

impl ServerCapabilities {
    /// Whether the server declared no capabilities at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the server declared the named capability (e.g. "resources")
    pub fn supports(&self, capability: &str) -> bool {
        self.0.contains_key(capability)
    }

    /// Declared capability names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Connection settings for a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Endpoint receiving every POST
    pub endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Protocol version declared in the handshake
    pub protocol_version: String,
    /// Identity declared in the handshake
    pub client_info: Implementation,
}

impl SessionOptions {
    /// Options for an endpoint with every other setting defaulted
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            endpoint: crate::DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

/// JSON-RPC session against a single HTTP endpoint
///
/// One `reqwest::Client` is held for the whole session so the underlying
/// connection is reused across calls. Every call made before a successful
/// handshake first performs it.
pub struct SessionClient {
    options: SessionOptions,
    http: reqwest::Client,
    initialized: bool,
    capabilities: ServerCapabilities,
    server_info: Option<Implementation>,
    protocol_version: Option<String>,
    session_id: Option<String>,
}

impl SessionClient {
    /// Create a session; no network traffic happens until the first call
    pub fn new(options: SessionOptions) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|source| TransportError::Http {
                endpoint: options.endpoint.clone(),
                source,
            })?;

        Ok(Self {
            options,
            http,
            initialized: false,
            capabilities: ServerCapabilities::default(),
            server_info: None,
            protocol_version: None,
            session_id: None,
        })
    }

    /// Endpoint this session talks to
    pub fn endpoint(&self) -> &str {
        &self.options.endpoint
    }

    /// Whether a handshake has succeeded
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Capabilities cached from the last successful handshake
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Server identity from the last successful handshake
    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    /// Protocol version the server answered with
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Session id issued by the server, if any
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Perform the handshake and cache the server's capability set
    pub async fn initialize(&mut self) -> Result<ServerCapabilities, InitError> {
        let params = json!({
            "protocolVersion": self.options.protocol_version,
            "capabilities": {
                "resources": { "subscribe": true },
                "tools": { "listChanged": true }
            },
            "clientInfo": self.options.client_info,
        });
        let params = match params {
            Value::Object(map) => Some(map),
            _ => None,
        };

        let response = self.send(INITIALIZE_METHOD, params).await?;
        let result = response.into_result().map_err(|err| {
            warn!("Handshake rejected by server: {}", err);
            InitError::Rejected(err)
        })?;

        let protocol_version = result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .ok_or(InitError::MissingProtocolVersion)?
            .to_string();

        self.capabilities = result
            .get("capabilities")
            .cloned()
            .and_then(|caps| serde_json::from_value(caps).ok())
            .unwrap_or_default();
        self.server_info = result
            .get("serverInfo")
            .cloned()
            .and_then(|info| serde_json::from_value(info).ok());
        self.protocol_version = Some(protocol_version);
        self.initialized = true;

        info!(
            protocol_version = self.protocol_version.as_deref().unwrap_or_default(),
            server = self
                .server_info
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or("unknown"),
            "Session initialized"
        );
        Ok(self.capabilities.clone())
    }

    /// Send a request and return its `result` mapping
    ///
    /// An uninitialized session performs the handshake first; if that fails
    /// the request itself is never sent.
    pub async fn call(
        &mut self,
        method: &str,
        params: Option<Map<String, Value>>,
    ) -> Result<Value, CallError> {
        self.ensure_initialized(method).await?;

        let response = self.send(method, params).await?;
        response.into_result().map_err(|err| {
            debug!(method, code = err.code, "Request rejected: {}", err.message);
            CallError::Application(err)
        })
    }

    /// `resources/list`
    pub async fn list_resources(&mut self) -> Result<Value, CallError> {
        self.call("resources/list", None).await
    }

    /// `resources/read` for a single URI
    pub async fn read_resource(&mut self, uri: &str) -> Result<Value, CallError> {
        let mut params = Map::new();
        params.insert("uri".to_string(), Value::String(uri.to_string()));
        self.call("resources/read", Some(params)).await
    }

    /// `tools/list`
    pub async fn list_tools(&mut self) -> Result<Value, CallError> {
        self.call("tools/list", None).await
    }

    /// `tools/call` with a name and an arguments mapping
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, CallError> {
        let mut params = Map::new();
        params.insert("name".to_string(), Value::String(name.to_string()));
        params.insert("arguments".to_string(), Value::Object(arguments));
        self.call("tools/call", Some(params)).await
    }

    async fn ensure_initialized(&mut self, method: &str) -> Result<(), InitError> {
        if self.initialized || method == INITIALIZE_METHOD {
            return Ok(());
        }

        debug!("Session not initialized, performing handshake before '{}'", method);
        self.initialize().await.map(|_| ())
    }

    async fn send(
        &mut self,
        method: &str,
        params: Option<Map<String, Value>>,
    ) -> Result<ResponseEnvelope, TransportError> {
        let request = envelope::encode(method, params);
        debug!(method, endpoint = %self.options.endpoint, "Sending request");

        let mut builder = self
            .http
            .post(&self.options.endpoint)
            .header(ACCEPT, "application/json")
            .json(&request);
        if let Some(session_id) = &self.session_id {
            builder = builder.header(SESSION_ID_HEADER, session_id);
        }

        let response = builder.send().await.map_err(|source| {
            let err = TransportError::Http {
                endpoint: self.options.endpoint.clone(),
                source,
            };
            if err.is_timeout() {
                warn!(method, "No response within {:?}", self.options.timeout);
            }
            err
        })?;

        if let Some(session_id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|value: &HeaderValue| value.to_str().ok())
        {
            if self.session_id.as_deref() != Some(session_id) {
                debug!("Server issued session id {}", session_id);
                self.session_id = Some(session_id.to_string());
            }
        }

        let status = response.status();
        let bytes = response.bytes().await.map_err(|source| TransportError::Http {
            endpoint: self.options.endpoint.clone(),
            source,
        })?;

        if !status.is_success() {
            // A rejection carried in an error envelope is still the service answering
            return match envelope::decode(&bytes) {
                Ok(envelope) if envelope.error().is_some() => {
                    debug!(method, status = status.as_u16(), "Error envelope on HTTP failure");
                    Ok(envelope)
                }
                _ => Err(TransportError::Status {
                    endpoint: self.options.endpoint.clone(),
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                }),
            };
        }

        Ok(envelope::decode(&bytes)?)
    }
}
