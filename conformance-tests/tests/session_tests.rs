//! Session client behavior against a mock Station endpoint

mod common;

use assert_matches::assert_matches;
use common::{Behavior, Handshake, MockStation, refused_endpoint};
use serde_json::{Map, Value, json};
use std::time::Duration;
use station_conformance::error::{ErrorKind, TransportError};
use station_conformance::{CallError, InitError, SessionClient, SessionOptions};

fn session(endpoint: &str) -> SessionClient {
    SessionClient::new(SessionOptions::new(endpoint)).unwrap()
}

#[tokio::test]
async fn test_first_call_performs_handshake() {
    let server = MockStation::start(Behavior::default()).await;
    let mut session = session(&server.endpoint);

    let result = session.list_resources().await.unwrap();

    assert_eq!(server.methods(), vec!["initialize", "resources/list"]);
    assert!(session.is_initialized());
    assert_eq!(session.protocol_version(), Some("2024-11-05"));
    assert_eq!(session.server_info().unwrap().name, "station");
    assert!(session.capabilities().supports("resources"));
    assert!(session.capabilities().supports("tools"));
    assert_eq!(result["resources"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_minimal_handshake_initializes() {
    let server = MockStation::start(Behavior {
        handshake: Handshake::Result(json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {"name": "x", "version": "1"},
            "capabilities": {"resources": {}, "tools": {}}
        })),
        ..Behavior::default()
    })
    .await;
    let mut session = session(&server.endpoint);

    let capabilities = session.initialize().await.unwrap();

    assert!(session.is_initialized());
    assert!(!capabilities.is_empty());
    assert_eq!(capabilities.names().collect::<Vec<_>>(), vec!["resources", "tools"]);
    assert_eq!(session.server_info().unwrap().version, "1");
}

#[tokio::test]
async fn test_explicit_initialize_resends_handshake() {
    let server = MockStation::start(Behavior::default()).await;
    let mut session = session(&server.endpoint);

    session.initialize().await.unwrap();
    session.initialize().await.unwrap();
    session.list_tools().await.unwrap();

    assert_eq!(server.methods(), vec!["initialize", "initialize", "tools/list"]);
}

#[tokio::test]
async fn test_handshake_declares_client_capabilities() {
    let server = MockStation::start(Behavior::default()).await;
    let mut session = session(&server.endpoint);
    session.initialize().await.unwrap();

    let calls = server.calls();
    assert_eq!(calls.len(), 1);
    let params = &calls[0].params;
    assert_eq!(params["protocolVersion"], "2024-11-05");
    assert_eq!(params["capabilities"]["resources"]["subscribe"], true);
    assert_eq!(params["capabilities"]["tools"]["listChanged"], true);
    assert_eq!(params["clientInfo"]["name"], "station-conformance");
}

#[tokio::test]
async fn test_handshake_runs_once() {
    let server = MockStation::start(Behavior::default()).await;
    let mut session = session(&server.endpoint);

    session.list_resources().await.unwrap();
    session.list_tools().await.unwrap();
    session.read_resource("station://environments").await.unwrap();

    assert_eq!(server.count("initialize"), 1);
    assert_eq!(
        server.methods(),
        vec!["initialize", "resources/list", "tools/list", "resources/read"]
    );
}

#[tokio::test]
async fn test_handshake_without_protocol_version_leaves_session_uninitialized() {
    let server = MockStation::start(Behavior {
        handshake: Handshake::MissingProtocolVersion,
        ..Behavior::default()
    })
    .await;
    let mut session = session(&server.endpoint);

    let err = session.list_resources().await.unwrap_err();

    assert_matches!(err, CallError::Init(InitError::MissingProtocolVersion));
    assert_eq!(err.kind(), ErrorKind::Assertion);
    assert!(!session.is_initialized());
    assert!(session.capabilities().is_empty());
    assert_eq!(server.methods(), vec!["initialize"]);
}

#[tokio::test]
async fn test_rejected_handshake_never_sends_gated_request() {
    let server = MockStation::start(Behavior {
        handshake: Handshake::RpcError,
        ..Behavior::default()
    })
    .await;
    let mut session = session(&server.endpoint);

    let err = session.list_tools().await.unwrap_err();
    assert_matches!(err, CallError::Init(InitError::Rejected(ref rpc)) if rpc.code == -32600);
    assert_eq!(err.kind(), ErrorKind::Application);

    // every later call retries the handshake and still gates the request
    let err = session.read_resource("station://agents").await.unwrap_err();
    assert_matches!(err, CallError::Init(_));
    assert_eq!(server.methods(), vec!["initialize", "initialize"]);
    assert!(!session.is_initialized());
}

#[tokio::test]
async fn test_http_status_failure_is_transport() {
    let server = MockStation::start(Behavior {
        handshake: Handshake::HttpStatus(500),
        ..Behavior::default()
    })
    .await;
    let mut session = session(&server.endpoint);

    let err = session.list_resources().await.unwrap_err();
    assert_matches!(
        err,
        CallError::Init(InitError::Transport(TransportError::Status { status: 500, .. }))
    );
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_error_envelope_on_http_failure_is_application() {
    let server = MockStation::start(Behavior {
        http_error_for: Some(("tools/list".to_string(), 400)),
        ..Behavior::default()
    })
    .await;
    let mut session = session(&server.endpoint);

    let err = session.list_tools().await.unwrap_err();
    assert_matches!(err, CallError::Application(ref rpc) if rpc.code == -32700);
    assert_eq!(err.kind(), ErrorKind::Application);
}

#[tokio::test]
async fn test_error_envelope_on_failed_handshake_is_rejection() {
    let server = MockStation::start(Behavior {
        http_error_for: Some(("initialize".to_string(), 400)),
        ..Behavior::default()
    })
    .await;
    let mut session = session(&server.endpoint);

    let err = session.list_resources().await.unwrap_err();
    assert_matches!(err, CallError::Init(InitError::Rejected(ref rpc)) if rpc.message == "Parse error");
    assert!(!session.is_initialized());
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockStation::start(Behavior {
        slow_for: Some("resources/list".to_string()),
        ..Behavior::default()
    })
    .await;
    let mut session = SessionClient::new(SessionOptions {
        timeout: Duration::from_millis(200),
        ..SessionOptions::new(&server.endpoint)
    })
    .unwrap();

    let err = session.list_resources().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_matches!(err, CallError::Transport(ref transport) if transport.is_timeout());
    assert!(session.is_initialized());
}

#[tokio::test]
async fn test_undecodable_body_is_transport() {
    let server = MockStation::start(Behavior {
        garbage_for: Some("tools/list".to_string()),
        ..Behavior::default()
    })
    .await;
    let mut session = session(&server.endpoint);

    let err = session.list_tools().await.unwrap_err();
    assert_matches!(err, CallError::Transport(TransportError::Decode(_)));
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(session.is_initialized());
}

#[tokio::test]
async fn test_error_envelope_is_application() {
    let server = MockStation::start(Behavior::default()).await;
    let mut session = session(&server.endpoint);

    let err = session.call("prompts/list", None).await.unwrap_err();
    assert_matches!(err, CallError::Application(ref rpc) if rpc.code == -32601);
    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(err.rpc_error().unwrap().message, "Method not found");

    let err = session.read_resource("station://agents/999").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
}

#[tokio::test]
async fn test_connection_refused_is_transport() {
    let endpoint = refused_endpoint().await;
    let mut session = session(&endpoint);

    let err = session.list_resources().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_matches!(
        err,
        CallError::Init(InitError::Transport(ref transport)) if transport.is_connect()
    );
    assert!(!session.is_initialized());
}

#[tokio::test]
async fn test_repeated_list_is_stable() {
    let server = MockStation::start(Behavior::default()).await;
    let mut session = session(&server.endpoint);

    let first = session.list_resources().await.unwrap();
    let second = session.list_resources().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_session_id_is_replayed() {
    let server = MockStation::start(Behavior {
        session_id: Some("sess-42".to_string()),
        ..Behavior::default()
    })
    .await;
    let mut session = session(&server.endpoint);

    session.list_resources().await.unwrap();
    assert_eq!(session.session_id(), Some("sess-42"));

    let headers: Vec<Option<String>> = server
        .calls()
        .into_iter()
        .map(|call| call.session_header)
        .collect();
    assert_eq!(headers, vec![None, Some("sess-42".to_string())]);
}

#[tokio::test]
async fn test_call_tool_sends_name_and_arguments() {
    let server = MockStation::start(Behavior::default()).await;
    let mut session = session(&server.endpoint);

    let mut arguments = Map::new();
    arguments.insert("name".to_string(), json!("probe"));
    arguments.insert("description".to_string(), json!("d"));
    arguments.insert("environment_id".to_string(), json!("1"));
    let result = session.call_tool("create_agent", arguments).await.unwrap();

    let call = server.calls().pop().unwrap();
    assert_eq!(call.method, "tools/call");
    assert_eq!(call.params["name"], "create_agent");
    assert_eq!(call.params["arguments"]["environment_id"], "1");

    let text = result["content"][0]["text"].as_str().unwrap();
    let payload: Value = serde_json::from_str(text).unwrap();
    assert_eq!(payload["success"], true);
    assert_eq!(payload["agent"]["environment_id"], 1);
}
