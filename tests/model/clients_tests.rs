// Model client tests - an axum server standing in for OpenAI and Ollama
//
// The requested model name picks the reply: plain text, a tool call, or a
// server error. Every request body is recorded for inspection.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use toolrelay_core::config::{ApiFormat, ModelProviderConfig, ToolCallMode};
use toolrelay_core::domain::Turn;
use toolrelay_core::model::clients::{OllamaClient, OpenAIClient};
use toolrelay_core::model::{ModelClient, ModelError, ModelRequest, ToolSpec};

#[derive(Default)]
struct Recorded {
    bodies: Mutex<Vec<Value>>,
    auth: Mutex<Vec<String>>,
}

fn record(state: &Recorded, headers: &HeaderMap, body: &Value) {
    state.bodies.lock().unwrap().push(body.clone());
    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        state.auth.lock().unwrap().push(auth.to_string());
    }
}

async fn openai_chat(
    State(state): State<Arc<Recorded>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, &headers, &body);
    match body["model"].as_str().unwrap_or_default() {
        "tools" => Json(json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": "add", "arguments": "{\"a\":2,\"b\":3}"}
                }]
            }}]
        }))
        .into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        _ => Json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello from OpenAI"}}]
        }))
        .into_response(),
    }
}

async fn ollama_chat(
    State(state): State<Arc<Recorded>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, &headers, &body);
    match body["model"].as_str().unwrap_or_default() {
        "tools" => Json(json!({
            "model": "tools",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "add", "arguments": {"a": 2, "b": 3}}}]
            },
            "done": true
        }))
        .into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response(),
        _ => Json(json!({
            "model": "text",
            "message": {"role": "assistant", "content": "Hello from Ollama"},
            "done": true
        }))
        .into_response(),
    }
}

async fn spawn_mock() -> (String, Arc<Recorded>) {
    let state = Arc::new(Recorded::default());
    let app = Router::new()
        .route("/v1/chat/completions", post(openai_chat))
        .route("/api/chat", post(ollama_chat))
        .with_state(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    (format!("http://{addr}"), state)
}

fn provider(format: ApiFormat, endpoint: &str, api_key: Option<&str>) -> ModelProviderConfig {
    ModelProviderConfig {
        id: "mock".into(),
        format,
        endpoint: endpoint.to_string(),
        api_key: api_key.map(str::to_string),
        api_path: None,
        models: Vec::new(),
    }
}

fn request(model: &str) -> ModelRequest {
    ModelRequest {
        provider: "mock".into(),
        model: model.into(),
        system: "Be brief.".into(),
        messages: vec![Turn::user("add 2 and 3")],
        tools: vec![ToolSpec {
            name: "add".into(),
            description: Some("Add two numbers".into()),
            parameters: json!({
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"],
                "additionalProperties": false
            }),
        }],
        tool_call_mode: ToolCallMode::Native,
    }
}

#[tokio::test]
async fn openai_text_reply() {
    let (endpoint, state) = spawn_mock().await;
    let client = OpenAIClient::from_config(&provider(ApiFormat::OpenAi, &endpoint, None));

    let response = client.chat(request("text")).await.expect("chat");

    assert_eq!(response.text.as_deref(), Some("Hello from OpenAI"));
    assert!(response.tool_calls.is_empty());

    let body = state.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["stream"], json!(false));
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "add 2 and 3");
    assert_eq!(body["tools"][0]["type"], "function");
    assert_eq!(body["tools"][0]["function"]["name"], "add");
    assert!(state.auth.lock().unwrap().is_empty());
}

#[tokio::test]
async fn openai_tool_call_arguments_are_decoded() {
    let (endpoint, _state) = spawn_mock().await;
    let client = OpenAIClient::from_config(&provider(ApiFormat::OpenAi, &endpoint, None));

    let response = client.chat(request("tools")).await.expect("chat");

    assert_eq!(response.text, None);
    assert_eq!(response.tool_calls.len(), 1);
    let call = &response.tool_calls[0];
    assert_eq!(call.id.as_deref(), Some("call_abc"));
    assert_eq!(call.name, "add");
    assert_eq!(call.arguments, json!({"a": 2, "b": 3}));
}

#[tokio::test]
async fn openai_error_status_is_a_network_error() {
    let (endpoint, _state) = spawn_mock().await;
    let client = OpenAIClient::from_config(&provider(ApiFormat::OpenAi, &endpoint, None));

    let err = client.chat(request("broken")).await.unwrap_err();

    match &err {
        ModelError::Network { provider, source } => {
            assert_eq!(provider, "mock");
            assert_eq!(source.status().map(|s| s.as_u16()), Some(500));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.user_message().contains("500"));
}

#[tokio::test]
#[serial]
async fn openai_sends_the_configured_key() {
    unsafe { std::env::set_var("TOOLRELAY_IT_MODEL_KEY", "sk-mock") };
    let (endpoint, state) = spawn_mock().await;
    let client = OpenAIClient::from_config(&provider(
        ApiFormat::OpenAi,
        &endpoint,
        Some("TOOLRELAY_IT_MODEL_KEY"),
    ));

    client.chat(request("text")).await.expect("chat");

    assert_eq!(*state.auth.lock().unwrap(), vec!["Bearer sk-mock"]);
    unsafe { std::env::remove_var("TOOLRELAY_IT_MODEL_KEY") };
}

#[tokio::test]
#[serial]
async fn openai_unset_key_fails_before_sending() {
    unsafe { std::env::remove_var("TOOLRELAY_IT_MODEL_KEY") };
    let (endpoint, state) = spawn_mock().await;
    let client = OpenAIClient::from_config(&provider(
        ApiFormat::OpenAi,
        &endpoint,
        Some("TOOLRELAY_IT_MODEL_KEY"),
    ));

    let err = client.chat(request("text")).await.unwrap_err();

    assert!(matches!(err, ModelError::MissingApiKey { .. }));
    assert!(state.bodies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn ollama_text_reply() {
    let (endpoint, state) = spawn_mock().await;
    let client = OllamaClient::from_config(&provider(ApiFormat::Ollama, &endpoint, None));

    let response = client.chat(request("text")).await.expect("chat");

    assert_eq!(response.text.as_deref(), Some("Hello from Ollama"));
    assert!(response.tool_calls.is_empty());
    let body = state.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["model"], "text");
    assert_eq!(body["stream"], json!(false));
    assert_eq!(body["tools"][0]["function"]["name"], "add");
}

#[tokio::test]
async fn ollama_tool_call_keeps_object_arguments() {
    let (endpoint, _state) = spawn_mock().await;
    let client = OllamaClient::from_config(&provider(ApiFormat::Ollama, &endpoint, None));

    let response = client.chat(request("tools")).await.expect("chat");

    assert_eq!(response.text, None);
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "add");
    assert_eq!(response.tool_calls[0].arguments, json!({"a": 2, "b": 3}));
    assert_eq!(response.tool_calls[0].id, None);
}

#[tokio::test]
async fn ollama_error_status_is_a_network_error() {
    let (endpoint, _state) = spawn_mock().await;
    let client = OllamaClient::from_config(&provider(ApiFormat::Ollama, &endpoint, None));

    let err = client.chat(request("broken")).await.unwrap_err();

    assert!(matches!(
        &err,
        ModelError::Network { source, .. } if source.status().map(|s| s.as_u16()) == Some(500)
    ));
}

#[tokio::test]
async fn directive_mode_sends_no_tool_definitions() {
    let (endpoint, state) = spawn_mock().await;
    let client = OllamaClient::from_config(&provider(ApiFormat::Ollama, &endpoint, None));
    let mut directive = request("text");
    directive.tool_call_mode = ToolCallMode::Directive;

    client.chat(directive).await.expect("chat");

    let body = state.bodies.lock().unwrap()[0].clone();
    assert!(body.get("tools").is_none());
}
