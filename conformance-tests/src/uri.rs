//! Station resource URIs

/// All environments
pub const ENVIRONMENTS_URI: &str = "station://environments";

/// All agents
pub const AGENTS_URI: &str = "station://agents";

/// File-based MCP configurations across environments
pub const MCP_CONFIGS_URI: &str = "station://mcp-configs";

/// Details of one agent
pub const AGENT_DETAILS: UriTemplate = UriTemplate::new("station://agents/{id}");

/// Run history of one agent
pub const AGENT_RUNS: UriTemplate = UriTemplate::new("station://agents/{id}/runs");

/// Tools available in one environment
pub const ENVIRONMENT_TOOLS: UriTemplate = UriTemplate::new("station://environments/{id}/tools");

const ID_PLACEHOLDER: &str = "{id}";

/// Resource URI with a single numeric `{id}` segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UriTemplate(&'static str);

impl UriTemplate {
    /// Wrap a template string containing `{id}`
    pub const fn new(template: &'static str) -> Self {
        Self(template)
    }

    /// Substitute an identifier into the template
    pub fn expand(&self, id: i64) -> String {
        self.0.replacen(ID_PLACEHOLDER, &id.to_string(), 1)
    }

    /// Raw template text
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}
