// Bridge tests - configuration to conversation without a real model
//
// Servers come from ServerConfig values the way the CLI builds them, the
// model is scripted, and turns run through Conversation.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use toolrelay_core::config::{ServerConfig, ServerTransport, StdioServer};
use toolrelay_core::domain::{ToolCallIntent, ToolDescriptor, ToolPayload, Turn};
use toolrelay_core::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use toolrelay_core::tooling::{
    CollisionPolicy, LocalProvider, RegistryError, ServerManager, ToolRegistry,
};
use toolrelay_core::{Agent, AgentOptions, Conversation, TranscriptPolicy};

struct ScriptedModel {
    responses: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    fn new(responses: Vec<ModelResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ModelProvider for ScriptedModel {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ModelError::invalid_response("scripted", "script exhausted"))
    }
}

fn missing_server(name: &str, mandatory: bool) -> ServerConfig {
    ServerConfig {
        name: name.to_string(),
        transport: ServerTransport::Stdio(StdioServer {
            command: PathBuf::from("/nonexistent/toolrelay-server"),
            args: Vec::new(),
            env: HashMap::new(),
            workdir: None,
        }),
        mandatory,
        handshake_timeout: Duration::from_secs(1),
        call_timeout: Duration::from_secs(1),
    }
}

fn shadowing_tools(provider: &'static str) -> LocalProvider {
    LocalProvider::new(provider).with_sync_tool(
        ToolDescriptor::new("lookup", "", json!({"type": "object"})),
        move |_| Ok(ToolPayload::Text(format!("from {provider}"))),
    )
}

#[tokio::test]
async fn optional_server_failure_is_skipped() {
    let mut registry = ToolRegistry::default();
    let manager = ServerManager::new(vec![missing_server("optional", false)]);

    let skipped = manager.register_all(&mut registry).await.expect("not fatal");

    assert_eq!(skipped, vec!["optional".to_string()]);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn mandatory_server_failure_is_fatal() {
    let mut registry = ToolRegistry::default();
    let manager = ServerManager::new(vec![missing_server("required", true)]);

    let err = manager.register_all(&mut registry).await.unwrap_err();

    let RegistryError::Provider { provider, .. } = err;
    assert_eq!(provider, "required");
}

#[tokio::test]
async fn later_provider_wins_a_name_collision() {
    let mut registry = ToolRegistry::new(CollisionPolicy::LastWins);
    registry.register(Arc::new(shadowing_tools("first"))).await.unwrap();
    registry.register(Arc::new(shadowing_tools("second"))).await.unwrap();
    let model = ScriptedModel::new(vec![
        ModelResponse::tool_calls(None, vec![ToolCallIntent::new("lookup", json!({}))]),
        ModelResponse::text("done"),
    ]);
    let agent = Arc::new(Agent::new(model.clone(), AgentOptions::new("scripted", "m")));
    let mut conversation =
        Conversation::new(agent, Arc::new(registry), TranscriptPolicy::default());

    let outcome = conversation.run_turn("look it up").await.expect("turn");

    assert_eq!(outcome.steps[0].output, "from second");
    assert_eq!(model.requests.lock().unwrap()[0].tools.len(), 1);
}

#[tokio::test]
async fn conversation_carries_history_across_turns() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);
    let provider = LocalProvider::new("builtin").with_sync_tool(
        ToolDescriptor::new(
            "add",
            "Add two numbers",
            json!({
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"]
            }),
        ),
        move |args| {
            recorded.lock().unwrap().push(args.clone());
            let sum = args["a"].as_i64().unwrap_or_default() + args["b"].as_i64().unwrap_or_default();
            Ok(ToolPayload::Text(sum.to_string()))
        },
    );
    let mut registry = ToolRegistry::default();
    registry.register(Arc::new(provider)).await.unwrap();
    let model = ScriptedModel::new(vec![
        ModelResponse::tool_calls(
            None,
            vec![ToolCallIntent::new("add", json!({"a": 2, "b": 3})).with_id("call_a")],
        ),
        ModelResponse::text("2 + 3 = 5"),
        ModelResponse::text("You asked about 2 + 3."),
    ]);
    let agent = Arc::new(Agent::new(model.clone(), AgentOptions::new("scripted", "m")));
    let mut conversation =
        Conversation::new(agent, Arc::new(registry), TranscriptPolicy::default());

    conversation.run_turn("add 2 and 3").await.expect("first turn");
    let second = conversation.run_turn("what did I ask?").await.expect("second turn");

    assert_eq!(second.response, "You asked about 2 + 3.");
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(conversation.transcript().len(), 6);

    let requests = model.requests.lock().unwrap();
    let last = &requests[2].messages;
    assert_eq!(last.len(), 5);
    let result = last
        .iter()
        .find_map(Turn::tool_result_ref)
        .expect("tool result in history");
    assert_eq!(result.invocation_id, "call_a");
    assert_eq!(result.payload.render(), "5");
}
