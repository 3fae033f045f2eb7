//! Secondary signal from the Station command-line surface
//!
//! Probes are coarse: a zero exit status plus an optional case-insensitive
//! substring in the output. They are reported beside the protocol steps and
//! never count toward the verdict.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::report::{StepOutcome, StepReport};

/// One subcommand to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliCommand {
    /// Arguments after the binary name
    pub args: Vec<String>,
    /// Substring expected somewhere in stdout or stderr
    #[serde(default)]
    pub expect: Option<String>,
}

impl CliCommand {
    fn new(args: &[&str], expect: Option<&str>) -> Self {
        Self {
            args: args.iter().map(|a| a.to_string()).collect(),
            expect: expect.map(str::to_string),
        }
    }
}

/// Command-line probe settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliProbeConfig {
    /// Run the probes at all
    pub enabled: bool,
    /// Binary to invoke
    pub binary: String,
    /// Directory the binary runs in
    pub working_dir: PathBuf,
    /// Per-command timeout in seconds
    pub timeout_secs: u64,
    /// Commands to run, in order
    pub commands: Vec<CliCommand>,
}

impl Default for CliProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            binary: "stn".to_string(),
            working_dir: PathBuf::from("."),
            timeout_secs: 30,
            commands: vec![
                CliCommand::new(&["env", "list"], Some("environment")),
                CliCommand::new(&["agent", "list"], Some("agent")),
                CliCommand::new(&["mcp", "discover"], None),
            ],
        }
    }
}

/// Runs the configured commands as subprocesses
pub struct CliProbe {
    config: CliProbeConfig,
}

impl CliProbe {
    /// Create a probe runner
    pub fn new(config: CliProbeConfig) -> Self {
        Self { config }
    }

    /// Run every command in order; spawn failures become failed probes
    pub async fn run(&self) -> Vec<StepReport> {
        let mut reports = Vec::with_capacity(self.config.commands.len());
        for command in &self.config.commands {
            reports.push(self.probe(command).await);
        }
        reports
    }

    async fn probe(&self, command: &CliCommand) -> StepReport {
        let name = format!("{} {}", self.config.binary, command.args.join(" "));
        let started = Instant::now();
        info!("Running CLI probe: {}", name);

        let outcome = self.execute(command).await;
        if !outcome.is_passed() {
            warn!("CLI probe '{}' did not pass: {}", name, outcome.summary());
        }

        StepReport::new(
            name,
            "Command-line surface probe",
            outcome,
            started.elapsed(),
        )
    }

    async fn execute(&self, command: &CliCommand) -> StepOutcome {
        let child = Command::new(&self.config.binary)
            .args(&command.args)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return StepOutcome::AssertionFailure {
                    message: format!("failed to run '{}': {}", self.config.binary, e),
                };
            }
            Err(_) => {
                return StepOutcome::AssertionFailure {
                    message: format!("timed out after {} seconds", self.config.timeout_secs),
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("CLI probe stdout: {}", stdout.trim());

        if !output.status.success() {
            return StepOutcome::AssertionFailure {
                message: format!("exited with {}: {}", output.status, stderr.trim()),
            };
        }

        if let Some(expect) = &command.expect {
            let needle = expect.to_lowercase();
            let found = stdout.to_lowercase().contains(&needle)
                || stderr.to_lowercase().contains(&needle);
            if !found {
                return StepOutcome::AssertionFailure {
                    message: format!("output does not mention '{}'", expect),
                };
            }
        }

        StepOutcome::Passed {
            detail: format!("exit status 0, {} bytes of output", output.stdout.len()),
        }
    }
}
