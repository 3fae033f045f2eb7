//! Ordered pipeline of dependent conformance steps
//!
//! Steps share a [`RunContext`] that grows as values are extracted from
//! responses. A step declares the context value it needs; the pipeline skips
//! it when that value was never produced. No step can abort the run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

use crate::report::{ConformanceReport, ReportSink, StepFailure, StepOutcome, StepReport};
use crate::session::SessionClient;
use crate::steps::{self, AgentFixture};

/// Identifies a step in the standard pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    /// `resources/list`
    ListResources,
    /// `station://environments`
    ReadEnvironments,
    /// `station://agents`
    ReadAgents,
    /// `station://mcp-configs`
    ReadMcpConfigs,
    /// `tools/list`
    ListTools,
    /// `create_agent` tool call
    CreateAgent,
    /// `station://agents/{id}` for the created agent
    ReadAgentDetails,
    /// `station://agents/{id}/runs` for the created agent
    ReadAgentRuns,
    /// `station://environments/{id}/tools`
    ReadEnvironmentTools,
}

impl StepId {
    /// Stable snake_case name
    pub fn name(&self) -> &'static str {
        match self {
            StepId::ListResources => "list_resources",
            StepId::ReadEnvironments => "read_environments",
            StepId::ReadAgents => "read_agents",
            StepId::ReadMcpConfigs => "read_mcp_configs",
            StepId::ListTools => "list_tools",
            StepId::CreateAgent => "create_agent",
            StepId::ReadAgentDetails => "read_agent_details",
            StepId::ReadAgentRuns => "read_agent_runs",
            StepId::ReadEnvironmentTools => "read_environment_tools",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            StepId::ListResources => "List available resources",
            StepId::ReadEnvironments => "Read the environments collection",
            StepId::ReadAgents => "Read the agents collection",
            StepId::ReadMcpConfigs => "Read the MCP configs collection",
            StepId::ListTools => "List available tools",
            StepId::CreateAgent => "Create an agent through the create_agent tool",
            StepId::ReadAgentDetails => "Read the created agent through its detail resource",
            StepId::ReadAgentRuns => "Read the created agent's run history",
            StepId::ReadEnvironmentTools => "Read the tools of the first environment",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Context value a step needs from an earlier step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    /// An environment id read from the environments collection
    EnvironmentId,
    /// The agent created through the `create_agent` tool
    CreatedAgent,
}

impl Dependency {
    /// Whether the context holds this value
    pub fn is_satisfied(&self, ctx: &RunContext) -> bool {
        match self {
            Dependency::EnvironmentId => ctx.environment_id.is_some(),
            Dependency::CreatedAgent => ctx.agent.is_some(),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::EnvironmentId => f.write_str("environment id"),
            Dependency::CreatedAgent => f.write_str("created agent id"),
        }
    }
}

/// Agent created during the run, with the values that were sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAgent {
    /// Identifier assigned by the service
    pub id: i64,
    /// Name sent in the tool arguments
    pub name: String,
    /// Description sent in the tool arguments
    pub description: String,
}

/// Values accumulated across steps within one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    /// First environment id seen in the environments collection
    pub environment_id: Option<i64>,
    /// Agent created by the tool call
    pub agent: Option<CreatedAgent>,
}

/// One stage of the pipeline
#[async_trait]
pub trait ConformanceStep: Send + Sync {
    /// Which step this is
    fn id(&self) -> StepId;

    /// Context value required before the step can run
    fn dependency(&self) -> Option<Dependency> {
        None
    }

    /// Run the step, returning a pass detail or the failure
    async fn execute(
        &self,
        session: &mut SessionClient,
        ctx: &mut RunContext,
    ) -> Result<String, StepFailure>;
}

/// Runs steps in order against one session
pub struct Sequencer {
    steps: Vec<Box<dyn ConformanceStep>>,
}

impl Sequencer {
    /// Pipeline with an explicit list of steps
    pub fn new(steps: Vec<Box<dyn ConformanceStep>>) -> Self {
        Self { steps }
    }

    /// The standard Station resources-vs-tools pipeline
    pub fn standard(fixture: AgentFixture) -> Self {
        Self::new(steps::standard(fixture))
    }

    /// Steps in execution order
    pub fn steps(&self) -> impl Iterator<Item = &dyn ConformanceStep> {
        self.steps.iter().map(|s| s.as_ref())
    }

    /// Run every step and collect the report
    pub async fn run(&self, session: &mut SessionClient) -> ConformanceReport {
        self.run_with_sink(session, &mut ()).await
    }

    /// Run every step, forwarding each result to `sink` as it completes
    pub async fn run_with_sink(
        &self,
        session: &mut SessionClient,
        sink: &mut dyn ReportSink,
    ) -> ConformanceReport {
        let started = Instant::now();
        let mut report = ConformanceReport::new(session.endpoint());
        let mut ctx = RunContext::default();

        info!(
            "Running {} conformance steps against {}",
            self.steps.len(),
            session.endpoint()
        );

        for step in &self.steps {
            let id = step.id();
            sink.step_started(id.name());

            let step_started = Instant::now();
            let outcome = match step.dependency() {
                Some(dependency) if !dependency.is_satisfied(&ctx) => {
                    debug!(step = id.name(), "Skipping, missing {}", dependency);
                    StepOutcome::DependencySkipped {
                        missing: dependency,
                    }
                }
                _ => StepOutcome::from(step.execute(session, &mut ctx).await),
            };

            info!(step = id.name(), status = ?outcome.status(), "{}", outcome.summary());
            let entry = StepReport::new(id.name(), id.description(), outcome, step_started.elapsed());
            sink.step_finished(&entry);
            report.steps.push(entry);
        }

        report.record_session(session);
        report.duration_ms = started.elapsed().as_millis() as u64;
        report
    }
}
