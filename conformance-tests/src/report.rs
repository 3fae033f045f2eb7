//! Step outcomes and the run report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CallError, ErrorKind, PayloadError};
use crate::sequencer::{Dependency, StepId};
use crate::session::{Implementation, SessionClient};

/// Steps that must pass for a run to be trusted, besides the handshake
///
/// Everything else may degrade without flipping the verdict.
pub const VERDICT_STEPS: &[StepId] = &[StepId::ListResources];

/// Why a step did not pass
#[derive(Debug, Clone, PartialEq)]
pub enum StepFailure {
    /// Network, HTTP or body decoding fault
    Transport(String),
    /// The service rejected the request
    Application {
        /// JSON-RPC error code, absent for tool-level errors
        code: Option<i64>,
        /// Error message
        message: String,
    },
    /// The response had the wrong shape or failed a consistency check
    Assertion(String),
}

impl StepFailure {
    /// Create an assertion failure
    pub fn assertion<S: Into<String>>(message: S) -> Self {
        Self::Assertion(message.into())
    }
}

impl From<CallError> for StepFailure {
    fn from(err: CallError) -> Self {
        match err.kind() {
            ErrorKind::Transport => StepFailure::Transport(err.to_string()),
            ErrorKind::Application => {
                let code = err.rpc_error().map(|e| e.code);
                let message = err
                    .rpc_error()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| err.to_string());
                StepFailure::Application { code, message }
            }
            ErrorKind::Assertion => StepFailure::Assertion(err.to_string()),
        }
    }
}

impl From<PayloadError> for StepFailure {
    fn from(err: PayloadError) -> Self {
        StepFailure::Assertion(err.to_string())
    }
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Step passed
    Passed {
        /// What was observed
        detail: String,
    },
    /// Request never produced a usable envelope
    TransportError {
        /// Error message
        message: String,
    },
    /// Request reached the service and was rejected
    ApplicationError {
        /// JSON-RPC error code, absent for tool-level errors
        code: Option<i64>,
        /// Error message
        message: String,
    },
    /// Response decoded but violated an expectation
    AssertionFailure {
        /// What was violated
        message: String,
    },
    /// Step did not run because an upstream step did not produce its input
    DependencySkipped {
        /// Missing input
        missing: Dependency,
    },
}

impl StepOutcome {
    /// Tally bucket for this outcome
    pub fn status(&self) -> StepStatus {
        match self {
            StepOutcome::Passed { .. } => StepStatus::Passed,
            StepOutcome::DependencySkipped { .. } => StepStatus::Skipped,
            _ => StepStatus::Failed,
        }
    }

    /// Whether the step passed
    pub fn is_passed(&self) -> bool {
        self.status() == StepStatus::Passed
    }

    /// One-line human-readable description
    pub fn summary(&self) -> String {
        match self {
            StepOutcome::Passed { detail } => detail.clone(),
            StepOutcome::TransportError { message } => format!("transport error: {}", message),
            StepOutcome::ApplicationError {
                code: Some(code),
                message,
            } => format!("application error [{}]: {}", code, message),
            StepOutcome::ApplicationError { code: None, message } => {
                format!("application error: {}", message)
            }
            StepOutcome::AssertionFailure { message } => format!("assertion failed: {}", message),
            StepOutcome::DependencySkipped { missing } => {
                format!("skipped, missing dependency: {}", missing)
            }
        }
    }
}

impl From<Result<String, StepFailure>> for StepOutcome {
    fn from(result: Result<String, StepFailure>) -> Self {
        match result {
            Ok(detail) => StepOutcome::Passed { detail },
            Err(StepFailure::Transport(message)) => StepOutcome::TransportError { message },
            Err(StepFailure::Application { code, message }) => {
                StepOutcome::ApplicationError { code, message }
            }
            Err(StepFailure::Assertion(message)) => StepOutcome::AssertionFailure { message },
        }
    }
}

/// Tally bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step passed
    Passed,
    /// Transport, application or assertion failure
    Failed,
    /// Dependency missing
    Skipped,
}

/// Result of one step or probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    /// Step name
    pub name: String,
    /// Step description
    pub description: String,
    /// Outcome
    pub outcome: StepOutcome,
    /// Wall time spent in the step
    pub duration_ms: u64,
}

impl StepReport {
    /// Create a report entry
    pub fn new<N: Into<String>, D: Into<String>>(
        name: N,
        description: D,
        outcome: StepOutcome,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            outcome,
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Pass/fail/skip counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Passed steps
    pub passed: u32,
    /// Failed steps
    pub failed: u32,
    /// Skipped steps
    pub skipped: u32,
}

impl Tally {
    /// Count outcomes across report entries
    pub fn of<'a>(reports: impl IntoIterator<Item = &'a StepReport>) -> Self {
        reports
            .into_iter()
            .fold(Tally::default(), |mut tally, report| {
                match report.outcome.status() {
                    StepStatus::Passed => tally.passed += 1,
                    StepStatus::Failed => tally.failed += 1,
                    StepStatus::Skipped => tally.skipped += 1,
                }
                tally
            })
    }

    /// Total entries counted
    pub fn total(&self) -> u32 {
        self.passed + self.failed + self.skipped
    }
}

/// Receives step results as the pipeline produces them
pub trait ReportSink {
    /// Called before a step runs or is skipped
    fn step_started(&mut self, _name: &str) {}

    /// Called with each finished step
    fn step_finished(&mut self, report: &StepReport);
}

impl ReportSink for () {
    fn step_finished(&mut self, _report: &StepReport) {}
}

/// Full result of a conformance run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceReport {
    /// Endpoint under test
    pub endpoint: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Total wall time
    pub duration_ms: u64,
    /// Whether the handshake succeeded during the run
    pub initialized: bool,
    /// Protocol version the server negotiated
    pub protocol_version: Option<String>,
    /// Server identity from the handshake
    pub server_info: Option<Implementation>,
    /// Capability names the server declared
    pub capabilities: Vec<String>,
    /// Protocol steps in pipeline order
    pub steps: Vec<StepReport>,
    /// Command-line probes; informational only
    #[serde(default)]
    pub cli_probes: Vec<StepReport>,
}

impl ConformanceReport {
    /// Start an empty report for an endpoint
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            started_at: Utc::now(),
            duration_ms: 0,
            initialized: false,
            protocol_version: None,
            server_info: None,
            capabilities: Vec::new(),
            steps: Vec::new(),
            cli_probes: Vec::new(),
        }
    }

    /// Record handshake state from the session after the pipeline ran
    pub fn record_session(&mut self, session: &SessionClient) {
        self.initialized = session.is_initialized();
        self.protocol_version = session.protocol_version().map(str::to_string);
        self.server_info = session.server_info().cloned();
        self.capabilities = session.capabilities().names().map(str::to_string).collect();
    }

    /// Outcome of a named step
    pub fn outcome(&self, step: StepId) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|r| r.name == step.name())
            .map(|r| &r.outcome)
    }

    /// Counts across protocol steps
    pub fn tally(&self) -> Tally {
        Tally::of(&self.steps)
    }

    /// Counts across command-line probes
    pub fn probe_tally(&self) -> Tally {
        Tally::of(&self.cli_probes)
    }

    /// Whether the run can be trusted: handshake plus every verdict step passed
    pub fn is_trustworthy(&self) -> bool {
        self.initialized
            && VERDICT_STEPS
                .iter()
                .all(|step| self.outcome(*step).is_some_and(StepOutcome::is_passed))
    }
}
