//! Ollama client implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::config::{ModelProviderConfig, ToolCallMode};
use crate::domain::ToolCallIntent;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::traits::ModelClient;
use crate::infrastructure::model::types::{ModelError, ModelRequest, ModelResponse};

/// Ollama client for local LLM
#[derive(Clone)]
pub struct OllamaClient {
    base: HttpClientBase,
    api_path: String,
}

impl OllamaClient {
    pub fn from_config(config: &ModelProviderConfig) -> Self {
        Self {
            base: HttpClientBase::new(config.id.clone(), config.endpoint.clone(), None),
            api_path: config.chat_path().to_string(),
        }
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = self.base.build_url(&self.api_path);

        let (messages, tools) = match request.tool_call_mode {
            ToolCallMode::Native => (
                MessageAdapter::to_ollama_format(&request.system, &request.messages),
                MessageAdapter::to_function_specs(&request.tools),
            ),
            ToolCallMode::Directive => (
                MessageAdapter::to_directive_format(&request.system, &request.messages),
                Vec::new(),
            ),
        };
        let payload = OllamaRequest {
            model: request.model.clone(),
            messages,
            tools,
            stream: false,
        };

        info!(
            provider = self.base.id.as_str(),
            model = request.model.as_str(),
            messages = request.messages.len(),
            tools = payload.tools.len(),
            "Sending request to Ollama"
        );

        let response: OllamaResponse = self.base.post_json(&url, &payload, false).await?;
        debug!("Received response from Ollama");

        let message = response
            .message
            .ok_or_else(|| ModelError::invalid_response(&self.base.id, "missing message"))?;

        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|call| ToolCallIntent::new(call.function.name, call.function.arguments))
            .collect();
        let text = Some(message.content).filter(|content| !content.is_empty());
        Ok(ModelResponse::tool_calls(text, tool_calls))
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}
