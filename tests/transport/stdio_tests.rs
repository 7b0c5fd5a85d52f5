// Stdio transport tests - a shell script standing in for an MCP server
//
// The script answers the handshake, lists two tools, echoes text back and
// never answers calls to `sleep`. It also writes noise to stdout and stderr
// the transport must ignore.
#![cfg(unix)]

use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use toolrelay_core::config::StdioServer;
use toolrelay_core::domain::ToolInvocation;
use toolrelay_core::tooling::{
    ProviderError, RemoteProvider, RemoteTimeouts, StdioTransport, ToolProvider, ToolRegistry,
};

const FAKE_SERVER: &str = r#"#!/bin/sh
echo "fake server starting" >&2
printf '\033[32mINFO\033[0m listening on stdio\n'
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p')
  case "$line" in
    *'"result"'*) ;;
    *'"method":"notifications/initialized"'*) ;;
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{"protocolVersion":"2025-06-18","serverInfo":{"name":"fake","version":"0.1"},"instructions":"Use echo for testing.","capabilities":{"tools":{}}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":"srv-1","method":"ping"}\n'
      printf '{"jsonrpc":"2.0","id":"%s","result":{"tools":[{"name":"echo","description":"Echo text","inputSchema":{"type":"object","properties":{"text":{"type":"string"}},"required":["text"]}},{"name":"sleep","inputSchema":{"type":"object"}}]}}\n' "$id" ;;
    *'"name":"sleep"'*)
      echo "sleeping forever" >&2 ;;
    *'"method":"tools/call"'*)
      text=$(printf '%s' "$line" | sed -n 's/.*"text":"\([^"]*\)".*/\1/p')
      printf '{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}\n'
      printf '{"jsonrpc":"2.0","id":"%s","result":{"content":[{"type":"text","text":"%s"}],"isError":false}}\n' "$id" "$text" ;;
    *)
      printf '{"jsonrpc":"2.0","id":"%s","error":{"code":-32601,"message":"unknown method"}}\n' "$id" ;;
  esac
done
"#;

struct FakeServer {
    _dir: TempDir,
    script: PathBuf,
}

impl FakeServer {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("fake_mcp.sh");
        fs::write(&script, FAKE_SERVER).expect("write script");
        Self { _dir: dir, script }
    }

    fn spec(&self) -> StdioServer {
        StdioServer {
            command: PathBuf::from("sh"),
            args: vec![self.script.display().to_string()],
            env: HashMap::new(),
            workdir: None,
        }
    }

    fn provider(&self, call_timeout: Duration) -> RemoteProvider {
        let transport = Arc::new(StdioTransport::new("fake", self.spec()));
        RemoteProvider::new("fake", transport).with_timeouts(RemoteTimeouts {
            handshake: Duration::from_secs(5),
            call: call_timeout,
        })
    }
}

fn invocation(tool: &str, arguments: serde_json::Value) -> ToolInvocation {
    ToolInvocation {
        invocation_id: format!("inv-{tool}"),
        tool_name: tool.to_string(),
        arguments,
    }
}

#[tokio::test]
async fn handshake_reads_server_info_and_guidance() {
    let server = FakeServer::new();
    let provider = server.provider(Duration::from_secs(5));

    let info = provider.initialize().await.expect("handshake");

    assert_eq!(info.protocol_version, "2025-06-18");
    assert_eq!(info.server_name.as_deref(), Some("fake"));
    assert_eq!(provider.instructions().await.as_deref(), Some("Use echo for testing."));
    provider.shutdown().await;
}

#[tokio::test]
async fn lists_tools_despite_noise_and_server_ping() {
    let server = FakeServer::new();
    let provider = server.provider(Duration::from_secs(5));

    let tools = provider.list_tools().await.expect("tools/list");

    let names: Vec<_> = tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, vec!["echo", "sleep"]);
    assert_eq!(tools[0].input_schema["required"], json!(["text"]));
    provider.shutdown().await;
}

#[tokio::test]
async fn call_returns_text_content() {
    let server = FakeServer::new();
    let provider = server.provider(Duration::from_secs(5));

    let result = provider
        .call_tool(invocation("echo", json!({"text": "hello"})))
        .await;

    assert!(!result.is_error, "{:?}", result.payload);
    assert_eq!(result.invocation_id, "inv-echo");
    assert_eq!(result.payload.render(), "hello");
    provider.shutdown().await;
}

#[tokio::test]
async fn unanswered_call_times_out_and_session_survives() {
    let server = FakeServer::new();
    let provider = server.provider(Duration::from_millis(300));

    let result = provider.call_tool(invocation("sleep", json!({}))).await;
    assert!(result.is_error);
    assert!(result.payload.render().contains("timed out"));

    let result = provider
        .call_tool(invocation("echo", json!({"text": "still here"})))
        .await;
    assert!(!result.is_error);
    assert_eq!(result.payload.render(), "still here");
    provider.shutdown().await;
}

#[tokio::test]
async fn list_changed_notification_marks_registry_stale() {
    let server = FakeServer::new();
    let provider = Arc::new(server.provider(Duration::from_secs(5)));
    let mut registry = ToolRegistry::default();
    registry.register(provider.clone()).await.expect("register");
    assert!(!registry.is_stale());

    provider
        .call_tool(invocation("echo", json!({"text": "hi"})))
        .await;

    assert!(registry.is_stale());
    let reloaded = registry.reload().await;
    assert!(!reloaded.is_stale());
    assert_eq!(reloaded.len(), 2);
    registry.shutdown().await;
}

#[tokio::test]
async fn missing_executable_is_a_spawn_error() {
    let transport = Arc::new(StdioTransport::new(
        "ghost",
        StdioServer {
            command: PathBuf::from("/nonexistent/toolrelay-server"),
            args: Vec::new(),
            env: HashMap::new(),
            workdir: None,
        },
    ));
    let provider = RemoteProvider::new("ghost", transport);

    let err = provider.initialize().await.unwrap_err();

    assert!(matches!(err, ProviderError::Spawn { .. }));
}
