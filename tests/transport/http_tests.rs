// HTTP transport tests - an axum server standing in for an MCP endpoint
//
// The mock hands out a session id at initialize, insists on it afterwards,
// answers tools/list as an event stream and records the closing DELETE.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use toolrelay_core::config::HttpServer;
use toolrelay_core::domain::ToolInvocation;
use toolrelay_core::tooling::{
    HttpTransport, ProviderError, RemoteProvider, ToolProvider, Transport,
};

const SESSION: &str = "sess-42";

#[derive(Default)]
struct MockState {
    methods: Mutex<Vec<String>>,
    auth_headers: Mutex<Vec<String>>,
    deletes: AtomicUsize,
}

async fn handle_post(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    state.methods.lock().unwrap().push(method.clone());
    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        state.auth_headers.lock().unwrap().push(auth.to_string());
    }
    let id = body["id"].clone();

    if method == "initialize" {
        let reply = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": "2025-06-18",
                "serverInfo": {"name": "mock-http", "version": "1.0"},
                "capabilities": {"tools": {"listChanged": true}}
            }
        });
        return ([("Mcp-Session-Id", SESSION)], Json(reply)).into_response();
    }

    let session = headers.get("Mcp-Session-Id").and_then(|v| v.to_str().ok());
    if session != Some(SESSION) {
        return (StatusCode::BAD_REQUEST, "missing session").into_response();
    }

    match method.as_str() {
        "notifications/initialized" => StatusCode::ACCEPTED.into_response(),
        "tools/list" => {
            let notification = json!({"jsonrpc": "2.0", "method": "notifications/tools/list_changed"});
            let reply = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"tools": [{
                    "name": "lookup",
                    "description": "Look up a word",
                    "inputSchema": {"type": "object", "properties": {"word": {"type": "string"}}}
                }]}
            });
            let body = format!("event: message\ndata: {notification}\n\nevent: message\ndata: {reply}\n\n");
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        "tools/call" => {
            let word = body["params"]["arguments"]["word"].as_str().unwrap_or("?");
            Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "content": [],
                    "structuredContent": {"word": word, "definition": "a test word"}
                }
            }))
            .into_response()
        }
        _ => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": "method not found"}
        }))
        .into_response(),
    }
}

async fn handle_delete(State(state): State<Arc<MockState>>, headers: HeaderMap) -> StatusCode {
    if headers.get("Mcp-Session-Id").and_then(|v| v.to_str().ok()) == Some(SESSION) {
        state.deletes.fetch_add(1, Ordering::SeqCst);
    }
    StatusCode::NO_CONTENT
}

async fn spawn_mock() -> (String, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/mcp", post(handle_post).delete(handle_delete))
        .with_state(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    (format!("http://{addr}/mcp"), state)
}

fn spec(url: &str) -> HttpServer {
    let mut headers = BTreeMap::new();
    headers.insert("Authorization".to_string(), "Bearer static".to_string());
    HttpServer {
        url: url.to_string(),
        headers,
    }
}

#[tokio::test]
async fn session_header_is_kept_and_released() {
    let (url, state) = spawn_mock().await;
    let transport = Arc::new(HttpTransport::new("dict", spec(&url)));
    let provider = RemoteProvider::new("dict", transport.clone());

    let info = provider.initialize().await.expect("handshake");
    assert_eq!(info.server_name.as_deref(), Some("mock-http"));
    assert_eq!(transport.session_id().await.as_deref(), Some(SESSION));

    let tools = provider.list_tools().await.expect("tools/list");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "lookup");
    assert!(transport.catalog_changed());

    let result = provider
        .call_tool(ToolInvocation {
            invocation_id: "inv-1".into(),
            tool_name: "lookup".into(),
            arguments: json!({"word": "relay"}),
        })
        .await;
    assert!(!result.is_error, "{:?}", result.payload);
    assert_eq!(
        result.payload.render(),
        r#"{"word":"relay","definition":"a test word"}"#
    );

    provider.shutdown().await;
    assert_eq!(state.deletes.load(Ordering::SeqCst), 1);
    assert_eq!(transport.session_id().await, None);

    let methods = state.methods.lock().unwrap().clone();
    assert_eq!(
        methods,
        vec!["initialize", "notifications/initialized", "tools/list", "tools/call"]
    );
    let auth = state.auth_headers.lock().unwrap().clone();
    assert!(auth.iter().all(|value| value == "Bearer static"));
    assert_eq!(auth.len(), 4);
}

#[tokio::test]
async fn rpc_errors_carry_code_and_message() {
    let (url, _state) = spawn_mock().await;
    let transport = HttpTransport::new("dict", spec(&url));
    transport.request("initialize", json!({})).await.expect("initialize");

    let err = transport
        .request("resources/list", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Rpc { code: -32601, .. }));
}

#[tokio::test]
async fn requests_without_session_are_rejected_with_status() {
    let (url, _state) = spawn_mock().await;
    let transport = HttpTransport::new("dict", spec(&url));

    let err = transport.request("tools/list", json!({})).await.unwrap_err();

    match err {
        ProviderError::Transport { message, .. } => assert!(message.contains("400")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let transport = Arc::new(HttpTransport::new("dict", spec("http://127.0.0.1:9/mcp")));
    let provider = RemoteProvider::new("dict", transport);

    let err = provider.initialize().await.unwrap_err();

    assert!(matches!(err, ProviderError::Connection { .. }));
}

#[derive(Default)]
struct ExpiringState {
    initializes: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

// Issues "s1" then "s2" at initialize and forgets "s1" once a tool is called.
async fn handle_expiring(
    State(state): State<Arc<ExpiringState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let method = body["method"].as_str().unwrap_or_default();
    let id = body["id"].clone();
    let session = headers
        .get("Mcp-Session-Id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    match method {
        "initialize" => {
            let issued = state.initializes.fetch_add(1, Ordering::SeqCst) + 1;
            let reply = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"protocolVersion": "2025-06-18", "capabilities": {"tools": {}}}
            });
            ([("Mcp-Session-Id", format!("s{issued}"))], Json(reply)).into_response()
        }
        "notifications/initialized" => StatusCode::ACCEPTED.into_response(),
        "tools/call" => {
            state.calls.lock().unwrap().push(session.clone());
            if session != "s2" {
                return (StatusCode::NOT_FOUND, "unknown session").into_response();
            }
            Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"content": [{"type": "text", "text": "fresh"}]}
            }))
            .into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

#[tokio::test]
async fn expired_session_is_dropped_and_renegotiated() {
    let state = Arc::new(ExpiringState::default());
    let app = Router::new()
        .route("/mcp", post(handle_expiring))
        .with_state(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    let transport = Arc::new(HttpTransport::new("dict", spec(&format!("http://{addr}/mcp"))));
    let provider = RemoteProvider::new("dict", transport.clone());
    let invocation = || ToolInvocation {
        invocation_id: "inv-1".into(),
        tool_name: "lookup".into(),
        arguments: json!({}),
    };

    let first = provider.call_tool(invocation()).await;
    assert!(first.is_error);
    assert!(first.payload.render().contains("expired the session"));
    assert_eq!(transport.session_id().await, None);

    let second = provider.call_tool(invocation()).await;
    assert!(!second.is_error, "{:?}", second.payload);
    assert_eq!(second.payload.render(), "fresh");

    assert_eq!(state.initializes.load(Ordering::SeqCst), 2);
    assert_eq!(*state.calls.lock().unwrap(), vec!["s1", "s2"]);
}

#[tokio::test]
async fn not_found_without_a_session_stays_a_transport_error() {
    let (url, _state) = spawn_mock().await;
    let transport = HttpTransport::new("dict", spec(&url.replace("/mcp", "/missing")));

    let err = transport.request("initialize", json!({})).await.unwrap_err();

    match err {
        ProviderError::Transport { message, .. } => assert!(message.contains("404")),
        other => panic!("unexpected error: {other:?}"),
    }
}
