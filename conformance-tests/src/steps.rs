//! The Station resources-vs-tools steps

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::payload::{self, Collection, ToolPayload};
use crate::report::StepFailure;
use crate::sequencer::{ConformanceStep, CreatedAgent, Dependency, RunContext, StepId};
use crate::session::SessionClient;
use crate::uri;

/// Tool invoked to create the agent that later steps read back
pub const CREATE_AGENT_TOOL: &str = "create_agent";

/// Environment used when neither the fixture nor the run supplies one
pub const DEFAULT_ENVIRONMENT_ID: i64 = 1;

/// Arguments for the `create_agent` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentFixture {
    /// Agent name
    pub name: String,
    /// Agent description
    pub description: String,
    /// System prompt
    pub prompt: String,
    /// Target environment; falls back to the first environment read
    pub environment_id: Option<i64>,
    /// Maximum execution steps
    pub max_steps: u32,
    /// Whether the agent starts enabled
    pub enabled: bool,
    /// Append a timestamp to the name so repeated runs do not collide
    pub unique_name: bool,
}

impl Default for AgentFixture {
    fn default() -> Self {
        Self {
            name: "test-mcp-agent".to_string(),
            description: "Test agent created via MCP to validate the resources vs tools split"
                .to_string(),
            prompt: "You are a test agent created to validate Station's MCP resources vs tools \
                     implementation. Respond with 'MCP Test Successful!' when called."
                .to_string(),
            environment_id: None,
            max_steps: 3,
            enabled: true,
            unique_name: true,
        }
    }
}

impl AgentFixture {
    fn agent_name(&self) -> String {
        if self.unique_name {
            format!("{}-{}", self.name, chrono::Utc::now().timestamp_millis())
        } else {
            self.name.clone()
        }
    }

    fn arguments(&self, name: &str, environment_id: i64) -> Map<String, Value> {
        let args = json!({
            "name": name,
            "description": self.description,
            "prompt": self.prompt,
            // Station parses environment_id from a string argument
            "environment_id": environment_id.to_string(),
            "max_steps": self.max_steps,
            "enabled": self.enabled,
        });
        match args {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// The standard pipeline in execution order
pub fn standard(fixture: AgentFixture) -> Vec<Box<dyn ConformanceStep>> {
    vec![
        Box::new(ListResources),
        Box::new(ReadEnvironments),
        Box::new(ReadCollection {
            id: StepId::ReadAgents,
            uri: uri::AGENTS_URI,
            items_field: "agents",
        }),
        Box::new(ReadCollection {
            id: StepId::ReadMcpConfigs,
            uri: uri::MCP_CONFIGS_URI,
            items_field: "mcp_configs",
        }),
        Box::new(ListTools),
        Box::new(CreateAgent { fixture }),
        Box::new(ReadAgentDetails),
        Box::new(ReadAgentRuns),
        Box::new(ReadEnvironmentTools),
    ]
}

async fn read_payload(session: &mut SessionClient, uri: &str) -> Result<Value, StepFailure> {
    let result = session.read_resource(uri).await?;
    Ok(payload::resource_text(&result)?)
}

async fn read_collection(
    session: &mut SessionClient,
    uri: &str,
    items_field: &str,
) -> Result<Collection, StepFailure> {
    let payload = read_payload(session, uri).await?;
    Ok(payload::counted(&payload, "total_count", items_field)?)
}

fn expect_eq<T: PartialEq + std::fmt::Debug>(
    what: &str,
    actual: T,
    expected: T,
) -> Result<(), StepFailure> {
    if actual == expected {
        Ok(())
    } else {
        Err(StepFailure::assertion(format!(
            "{} is {:?}, expected {:?}",
            what, actual, expected
        )))
    }
}

/// `resources/list` returns a well-formed (possibly empty) descriptor list
pub struct ListResources;

#[async_trait]
impl ConformanceStep for ListResources {
    fn id(&self) -> StepId {
        StepId::ListResources
    }

    async fn execute(
        &self,
        session: &mut SessionClient,
        _ctx: &mut RunContext,
    ) -> Result<String, StepFailure> {
        let result = session.list_resources().await?;
        let resources = payload::resource_list(&result)?;
        for resource in &resources {
            debug!("Resource {} - {}", resource.uri, resource.name);
        }
        Ok(format!("found {} resources", resources.len()))
    }
}

/// Environments collection; remembers the first environment id
pub struct ReadEnvironments;

#[async_trait]
impl ConformanceStep for ReadEnvironments {
    fn id(&self) -> StepId {
        StepId::ReadEnvironments
    }

    async fn execute(
        &self,
        session: &mut SessionClient,
        ctx: &mut RunContext,
    ) -> Result<String, StepFailure> {
        let environments = read_collection(session, uri::ENVIRONMENTS_URI, "environments").await?;
        ctx.environment_id = environments
            .items
            .first()
            .and_then(|env| env.get("id"))
            .and_then(Value::as_i64);

        Ok(format!("{} environments", environments.total_count))
    }
}

/// A fixed collection resource read with the double decode
pub struct ReadCollection {
    /// Step identity
    pub id: StepId,
    /// Collection URI
    pub uri: &'static str,
    /// Field holding the entity sequence
    pub items_field: &'static str,
}

#[async_trait]
impl ConformanceStep for ReadCollection {
    fn id(&self) -> StepId {
        self.id
    }

    async fn execute(
        &self,
        session: &mut SessionClient,
        _ctx: &mut RunContext,
    ) -> Result<String, StepFailure> {
        let collection = read_collection(session, self.uri, self.items_field).await?;
        if collection.items.is_empty() {
            Ok(format!("no {} yet", self.items_field))
        } else {
            Ok(format!("{} {}", collection.total_count, self.items_field))
        }
    }
}

/// `tools/list` returns a well-formed descriptor list
pub struct ListTools;

#[async_trait]
impl ConformanceStep for ListTools {
    fn id(&self) -> StepId {
        StepId::ListTools
    }

    async fn execute(
        &self,
        session: &mut SessionClient,
        _ctx: &mut RunContext,
    ) -> Result<String, StepFailure> {
        let result = session.list_tools().await?;
        let tools = payload::tool_list(&result)?;
        for tool in &tools {
            debug!("Tool {} - {}", tool.name, tool.description);
        }
        Ok(format!("found {} tools", tools.len()))
    }
}

/// Mutating tool call whose new id is chained into later reads
pub struct CreateAgent {
    /// Arguments to send
    pub fixture: AgentFixture,
}

#[async_trait]
impl ConformanceStep for CreateAgent {
    fn id(&self) -> StepId {
        StepId::CreateAgent
    }

    async fn execute(
        &self,
        session: &mut SessionClient,
        ctx: &mut RunContext,
    ) -> Result<String, StepFailure> {
        let name = self.fixture.agent_name();
        let environment_id = self
            .fixture
            .environment_id
            .or(ctx.environment_id)
            .unwrap_or(DEFAULT_ENVIRONMENT_ID);

        let result = session
            .call_tool(CREATE_AGENT_TOOL, self.fixture.arguments(&name, environment_id))
            .await?;

        let payload = match payload::tool_text(&result)? {
            ToolPayload::Structured(payload) => payload,
            ToolPayload::Failed(message) => {
                return Err(StepFailure::Application {
                    code: None,
                    message,
                });
            }
        };

        match payload.get("success").and_then(Value::as_bool) {
            Some(true) => {}
            Some(false) => {
                let reason = payload
                    .get("error")
                    .or_else(|| payload.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("no reason given");
                return Err(StepFailure::assertion(format!(
                    "{} reported success=false: {}",
                    CREATE_AGENT_TOOL, reason
                )));
            }
            None => {
                return Err(StepFailure::assertion(format!(
                    "{} payload has no boolean 'success'",
                    CREATE_AGENT_TOOL
                )));
            }
        }

        let id = payload::integer_at(&payload, "/agent/id")?;
        ctx.agent = Some(CreatedAgent {
            id,
            name: name.clone(),
            description: self.fixture.description.clone(),
        });

        Ok(format!("created agent '{}' with id {}", name, id))
    }
}

/// Read-after-write: the created agent is visible through its resource
pub struct ReadAgentDetails;

#[async_trait]
impl ConformanceStep for ReadAgentDetails {
    fn id(&self) -> StepId {
        StepId::ReadAgentDetails
    }

    fn dependency(&self) -> Option<Dependency> {
        Some(Dependency::CreatedAgent)
    }

    async fn execute(
        &self,
        session: &mut SessionClient,
        ctx: &mut RunContext,
    ) -> Result<String, StepFailure> {
        let agent = ctx
            .agent
            .as_ref()
            .ok_or_else(|| StepFailure::assertion("created agent missing from context"))?;

        let payload = read_payload(session, &uri::AGENT_DETAILS.expand(agent.id)).await?;
        expect_eq("agent.id", payload::integer_at(&payload, "/agent/id")?, agent.id)?;
        expect_eq(
            "agent.name",
            payload::string_at(&payload, "/agent/name")?,
            agent.name.as_str(),
        )?;
        expect_eq(
            "agent.description",
            payload::string_at(&payload, "/agent/description")?,
            agent.description.as_str(),
        )?;

        Ok(format!("agent {} matches what was created", agent.id))
    }
}

/// Run history resource for the created agent
pub struct ReadAgentRuns;

#[async_trait]
impl ConformanceStep for ReadAgentRuns {
    fn id(&self) -> StepId {
        StepId::ReadAgentRuns
    }

    fn dependency(&self) -> Option<Dependency> {
        Some(Dependency::CreatedAgent)
    }

    async fn execute(
        &self,
        session: &mut SessionClient,
        ctx: &mut RunContext,
    ) -> Result<String, StepFailure> {
        let agent = ctx
            .agent
            .as_ref()
            .ok_or_else(|| StepFailure::assertion("created agent missing from context"))?;

        let payload = read_payload(session, &uri::AGENT_RUNS.expand(agent.id)).await?;
        expect_eq("agent.id", payload::integer_at(&payload, "/agent/id")?, agent.id)?;
        let runs = payload::counted(&payload, "runs_count", "runs")?;

        Ok(format!("{} runs for agent {}", runs.total_count, agent.id))
    }
}

/// Tools resource for the environment remembered from the collection read
pub struct ReadEnvironmentTools;

#[async_trait]
impl ConformanceStep for ReadEnvironmentTools {
    fn id(&self) -> StepId {
        StepId::ReadEnvironmentTools
    }

    fn dependency(&self) -> Option<Dependency> {
        Some(Dependency::EnvironmentId)
    }

    async fn execute(
        &self,
        session: &mut SessionClient,
        ctx: &mut RunContext,
    ) -> Result<String, StepFailure> {
        let environment_id = ctx
            .environment_id
            .ok_or_else(|| StepFailure::assertion("environment id missing from context"))?;

        let payload = read_payload(session, &uri::ENVIRONMENT_TOOLS.expand(environment_id)).await?;
        expect_eq(
            "environment.id",
            payload::integer_at(&payload, "/environment/id")?,
            environment_id,
        )?;
        let tools = payload::counted(&payload, "tools_count", "tools")?;

        Ok(format!(
            "{} tools in environment {}",
            tools.total_count, environment_id
        ))
    }
}
