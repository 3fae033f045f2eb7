//! In-process mock of the Station MCP HTTP endpoint

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// How the mock answers the handshake
#[derive(Debug, Clone, PartialEq)]
pub enum Handshake {
    Ok,
    MissingProtocolVersion,
    RpcError,
    HttpStatus(u16),
    /// Answer with this exact result mapping
    Result(Value),
}

/// How the mock answers `create_agent`
#[derive(Debug, Clone, PartialEq)]
pub enum CreateAgent {
    Success,
    SuccessFalse,
    MissingSuccess,
    ToolError,
    /// Succeeds, but the detail resource reports a different name
    WrongNameOnRead,
}

#[derive(Debug, Clone)]
pub struct Behavior {
    pub handshake: Handshake,
    pub create_agent: CreateAgent,
    pub environments: Vec<Value>,
    /// Declared `total_count` for the agents collection instead of the real one
    pub agents_count_override: Option<u64>,
    /// Session id issued on the handshake response
    pub session_id: Option<String>,
    /// Return a non-JSON body for this method
    pub garbage_for: Option<String>,
    /// Answer this method with an HTTP status and a JSON-RPC error envelope
    pub http_error_for: Option<(String, u16)>,
    /// Hold the answer to this method for two seconds
    pub slow_for: Option<String>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            handshake: Handshake::Ok,
            create_agent: CreateAgent::Success,
            environments: vec![
                json!({"id": 1, "name": "dev", "description": "Development"}),
                json!({"id": 2, "name": "prod", "description": "Production"}),
            ],
            agents_count_override: None,
            session_id: None,
            garbage_for: None,
            http_error_for: None,
            slow_for: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
    pub session_header: Option<String>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub behavior: Behavior,
    pub calls: Vec<RecordedCall>,
    pub agents: Vec<Value>,
}

impl MockState {
    pub fn methods(&self) -> Vec<String> {
        self.calls.iter().map(|c| c.method.clone()).collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls.iter().filter(|c| c.method == method).count()
    }
}

pub type SharedState = Arc<Mutex<MockState>>;

pub struct MockStation {
    pub endpoint: String,
    pub state: SharedState,
}

impl MockStation {
    pub async fn start(behavior: Behavior) -> Self {
        let state = Arc::new(Mutex::new(MockState {
            behavior,
            ..MockState::default()
        }));

        let app = Router::new()
            .route("/mcp", post(handle))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            endpoint: format!("http://{addr}/mcp"),
            state,
        }
    }

    pub fn methods(&self) -> Vec<String> {
        self.state.lock().unwrap().methods()
    }

    pub fn count(&self, method: &str) -> usize {
        self.state.lock().unwrap().count(method)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }
}

/// An endpoint on a port nothing listens on
pub async fn refused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/mcp")
}

fn ok(result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "result": result})
}

fn rpc_error(code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "error": {"code": code, "message": message}})
}

fn resource_contents(uri: &str, payload: Value) -> Value {
    ok(json!({
        "contents": [{
            "uri": uri,
            "mimeType": "application/json",
            "text": serde_json::to_string_pretty(&payload).unwrap(),
        }]
    }))
}

fn tool_text(text: String, is_error: bool) -> Value {
    ok(json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error,
    }))
}

async fn handle(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let params = body.get("params").cloned().unwrap_or(Value::Null);

    let slow = {
        let state = state.lock().unwrap();
        state.behavior.slow_for.as_deref() == Some(method.as_str())
    };
    if slow {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let mut state = state.lock().unwrap();
    state.calls.push(RecordedCall {
        method: method.clone(),
        params: params.clone(),
        session_header: headers
            .get("Mcp-Session-Id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    if state.behavior.garbage_for.as_deref() == Some(method.as_str()) {
        return (StatusCode::OK, "<html>not json</html>").into_response();
    }

    if let Some((failing, status)) = &state.behavior.http_error_for {
        if *failing == method {
            let status = StatusCode::from_u16(*status).unwrap();
            return (status, Json(rpc_error(-32700, "Parse error"))).into_response();
        }
    }

    if method == "initialize" {
        return handshake(&state.behavior);
    }

    let response = match method.as_str() {
        "resources/list" => ok(json!({
            "resources": [
                {"uri": "station://environments", "name": "Environments", "mimeType": "application/json"},
                {"uri": "station://agents", "name": "Agents", "mimeType": "application/json"},
                {"uri": "station://mcp-configs", "name": "MCP Configs", "mimeType": "application/json"}
            ]
        })),
        "resources/read" => read_resource(&state, params["uri"].as_str().unwrap_or_default()),
        "tools/list" => ok(json!({
            "tools": [
                {"name": "create_agent", "description": "Create a new agent"},
                {"name": "call_agent", "description": "Execute an agent"}
            ]
        })),
        "tools/call" => call_tool(&mut state, &params),
        _ => rpc_error(-32601, "Method not found"),
    };

    Json(response).into_response()
}

fn handshake(behavior: &Behavior) -> Response {
    let body = match behavior.handshake {
        Handshake::Ok => ok(json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {"name": "station", "version": "1.0.0"},
            "capabilities": {"resources": {"subscribe": true}, "tools": {"listChanged": true}}
        })),
        Handshake::MissingProtocolVersion => ok(json!({
            "serverInfo": {"name": "station", "version": "1.0.0"},
            "capabilities": {}
        })),
        Handshake::RpcError => rpc_error(-32600, "Invalid handshake"),
        Handshake::Result(ref result) => ok(result.clone()),
        Handshake::HttpStatus(status) => {
            let status = StatusCode::from_u16(status).unwrap();
            return (status, "handshake refused").into_response();
        }
    };

    let mut response = Json(body).into_response();
    if let Some(session_id) = &behavior.session_id {
        response
            .headers_mut()
            .insert("Mcp-Session-Id", HeaderValue::from_str(session_id).unwrap());
    }
    response
}

fn read_resource(state: &MockState, uri: &str) -> Value {
    let behavior = &state.behavior;
    match uri {
        "station://environments" => resource_contents(
            uri,
            json!({
                "total_count": behavior.environments.len(),
                "environments": behavior.environments,
                "resource_uri": uri,
            }),
        ),
        "station://agents" => resource_contents(
            uri,
            json!({
                "total_count": behavior
                    .agents_count_override
                    .unwrap_or(state.agents.len() as u64),
                "agents": state.agents,
                "resource_uri": uri,
            }),
        ),
        "station://mcp-configs" => resource_contents(
            uri,
            json!({"total_count": 0, "mcp_configs": null, "resource_uri": uri}),
        ),
        _ => read_templated(state, uri),
    }
}

fn read_templated(state: &MockState, uri: &str) -> Value {
    let Some(rest) = uri.strip_prefix("station://") else {
        return rpc_error(-32602, "unknown resource");
    };
    let segments: Vec<&str> = rest.split('/').collect();

    match segments.as_slice() {
        ["agents", id] | ["agents", id, "runs"] => {
            let Some(agent) = id
                .parse::<i64>()
                .ok()
                .and_then(|id| state.agents.iter().find(|a| a["id"] == id))
            else {
                return rpc_error(-32603, "failed to get agent");
            };

            if segments.len() == 3 {
                return resource_contents(
                    uri,
                    json!({
                        "agent": {"id": agent["id"], "name": agent["name"]},
                        "runs": null,
                        "runs_count": 0,
                        "resource_uri": uri,
                    }),
                );
            }

            let mut agent = agent.clone();
            if state.behavior.create_agent == CreateAgent::WrongNameOnRead {
                agent["name"] = json!("someone-else");
            }
            resource_contents(
                uri,
                json!({
                    "agent": agent,
                    "environment": state.behavior.environments.first().cloned().unwrap_or(Value::Null),
                    "tools": [],
                    "tools_count": 0,
                    "resource_uri": uri,
                }),
            )
        }
        ["environments", id, "tools"] => {
            let Some(environment) = id.parse::<i64>().ok().and_then(|id| {
                state
                    .behavior
                    .environments
                    .iter()
                    .find(|e| e["id"] == id)
            }) else {
                return rpc_error(-32603, "failed to get environment");
            };
            resource_contents(
                uri,
                json!({
                    "environment": environment,
                    "tools": [{"id": 1, "name": "read_file", "description": "Read a file"}],
                    "tools_count": 1,
                    "resource_uri": uri,
                }),
            )
        }
        _ => rpc_error(-32602, "unknown resource"),
    }
}

fn call_tool(state: &mut MockState, params: &Value) -> Value {
    if params["name"] != "create_agent" {
        return tool_text(format!("unknown tool {}", params["name"]), true);
    }
    let args = &params["arguments"];

    match state.behavior.create_agent {
        CreateAgent::SuccessFalse => {
            tool_text(json!({"success": false, "error": "duplicate name"}).to_string(), false)
        }
        CreateAgent::MissingSuccess => tool_text(json!({"agent": {"id": 5}}).to_string(), false),
        CreateAgent::ToolError => tool_text("Missing 'prompt' parameter".to_string(), true),
        CreateAgent::Success | CreateAgent::WrongNameOnRead => {
            let id = state.agents.len() as i64 + 1;
            let agent = json!({
                "id": id,
                "name": args["name"],
                "description": args["description"],
                "prompt": args["prompt"],
                "max_steps": args["max_steps"],
                "environment_id": args["environment_id"].as_str().and_then(|s| s.parse::<i64>().ok()),
            });
            state.agents.push(agent.clone());
            tool_text(
                json!({
                    "success": true,
                    "agent": agent,
                    "message": format!("Agent '{}' created successfully", args["name"]),
                })
                .to_string(),
                false,
            )
        }
    }
}
