//! Harness configuration
//!
//! Layers, lowest first: built-in defaults, a TOML file or environment
//! variables, then command-line overrides applied by the binary. Loading
//! never validates; call [`HarnessConfig::validate`] once every layer is in.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cli_probe::CliProbeConfig;
use crate::error::ConfigError;
use crate::session::{Implementation, SessionOptions};
use crate::steps::AgentFixture;
use crate::{DEFAULT_ENDPOINT, DEFAULT_PROTOCOL_VERSION, DEFAULT_TIMEOUT_SECONDS};

/// Environment variable overriding the endpoint
pub const ENV_ENDPOINT: &str = "STATION_MCP_ENDPOINT";

/// Environment variable overriding the request timeout (seconds)
pub const ENV_TIMEOUT: &str = "STATION_MCP_TIMEOUT";

/// Environment variable overriding the CLI probe binary
pub const ENV_CLI_BINARY: &str = "STATION_CLI_BINARY";

/// Complete harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Endpoint receiving JSON-RPC POSTs
    pub endpoint: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Protocol version declared in the handshake
    pub protocol_version: String,
    /// Agent created by the mutating step
    pub agent: AgentFixture,
    /// Command-line probes
    pub cli: CliProbeConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECONDS,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            agent: AgentFixture::default(),
            cli: CliProbeConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables over the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }

        if let Some(timeout) = lookup(ENV_TIMEOUT) {
            config.timeout_secs = timeout
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(format!("Invalid {}: {}", ENV_TIMEOUT, e)))?;
        }

        if let Some(binary) = lookup(ENV_CLI_BINARY) {
            config.cli.binary = binary;
        }

        Ok(config)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::validate_endpoint_url(&self.endpoint)?;

        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid("timeout_secs must be greater than 0"));
        }

        if self.protocol_version.trim().is_empty() {
            return Err(ConfigError::invalid("protocol_version must not be empty"));
        }

        if self.agent.name.trim().is_empty() {
            return Err(ConfigError::invalid("agent.name must not be empty"));
        }

        if self.cli.enabled {
            if self.cli.binary.trim().is_empty() {
                return Err(ConfigError::invalid("cli.binary must not be empty"));
            }
            if self.cli.timeout_secs == 0 {
                return Err(ConfigError::invalid(
                    "cli.timeout_secs must be greater than 0",
                ));
            }
            if self.cli.commands.iter().any(|c| c.args.is_empty()) {
                return Err(ConfigError::invalid("cli.commands entries need arguments"));
            }
        }

        Ok(())
    }

    /// Request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Session options derived from this configuration
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            endpoint: self.endpoint.clone(),
            timeout: self.timeout(),
            protocol_version: self.protocol_version.clone(),
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}
