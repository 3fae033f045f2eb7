//! Resources-vs-tools conformance harness for the Station MCP endpoint
//!
//! Station exposes read-only discovery through MCP *resources* and
//! state-changing operations through MCP *tools*. This crate drives a fixed,
//! ordered sequence of checks against a running Station server over
//! JSON-RPC/HTTP to confirm the split holds:
//!
//! - list and read the fixed collection resources, decoding the JSON text
//!   nested inside each result
//! - create an agent through the `create_agent` tool
//! - read the new agent back through its templated resource URI
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use station_conformance::{AgentFixture, Sequencer, SessionClient, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = SessionClient::new(SessionOptions::new("http://localhost:3001/mcp"))?;
//!     let report = Sequencer::standard(AgentFixture::default())
//!         .run(&mut session)
//!         .await;
//!
//!     let tally = report.tally();
//!     println!("{} passed, {} failed, {} skipped", tally.passed, tally.failed, tally.skipped);
//!     std::process::exit(if report.is_trustworthy() { 0 } else { 1 });
//! }
//! ```

pub mod cli_probe;
pub mod config;
pub mod envelope;
pub mod error;
pub mod payload;
pub mod report;
pub mod sequencer;
pub mod session;
pub mod steps;
pub mod uri;

pub use cli_probe::{CliCommand, CliProbe, CliProbeConfig};
pub use config::HarnessConfig;
pub use envelope::{RequestEnvelope, ResponseEnvelope, RpcError};
pub use error::{CallError, ConfigError, DecodeError, InitError, PayloadError, TransportError};
pub use report::{ConformanceReport, ReportSink, StepOutcome, StepReport, StepStatus, Tally};
pub use sequencer::{ConformanceStep, Dependency, RunContext, Sequencer, StepId};
pub use session::{ServerCapabilities, SessionClient, SessionOptions};
pub use steps::AgentFixture;

/// Endpoint a local Station server listens on
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3001/mcp";

/// Protocol version declared in the handshake
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Validate an endpoint URL
pub fn validate_endpoint_url(endpoint: &str) -> Result<url::Url, ConfigError> {
    let parsed = url::Url::parse(endpoint)
        .map_err(|e| ConfigError::invalid(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ConfigError::invalid(format!(
            "Unsupported endpoint scheme: {}. Only http and https are allowed.",
            scheme
        ))),
    }
}
