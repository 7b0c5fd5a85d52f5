//! OpenAI-compatible client implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::config::{ModelProviderConfig, ToolCallMode};
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::factory::api_key_from_env;
use crate::infrastructure::model::traits::ModelClient;
use crate::infrastructure::model::types::{ModelError, ModelRequest, ModelResponse};

/// OpenAI-compatible client (OpenAI, Mistral, Groq, vLLM, LM Studio, ...)
#[derive(Clone)]
pub struct OpenAIClient {
    base: HttpClientBase,
    api_path: String,
    require_key: bool,
}

impl OpenAIClient {
    pub fn from_config(config: &ModelProviderConfig) -> Self {
        let api_key = api_key_from_env(config);
        Self {
            base: HttpClientBase::new(config.id.clone(), config.endpoint.clone(), api_key),
            api_path: config.chat_path().to_string(),
            require_key: config.api_key.is_some(),
        }
    }
}

#[async_trait]
impl ModelClient for OpenAIClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = self.base.build_url(&self.api_path);

        let (messages, tools) = match request.tool_call_mode {
            ToolCallMode::Native => (
                MessageAdapter::to_openai_format(&request.system, &request.messages),
                MessageAdapter::to_function_specs(&request.tools),
            ),
            ToolCallMode::Directive => (
                MessageAdapter::to_directive_format(&request.system, &request.messages),
                Vec::new(),
            ),
        };
        let payload = OpenAIRequest {
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
            "Sending request to OpenAI-compatible provider"
        );

        let response: OpenAIResponse = self
            .base
            .post_json(&url, &payload, self.require_key)
            .await?;
        debug!("Received response from OpenAI-compatible provider");

        let message = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .ok_or_else(|| ModelError::invalid_response(&self.base.id, "missing message"))?;

        let tool_calls = MessageAdapter::parse_openai_tool_calls(&message.tool_calls);
        Ok(ModelResponse::tool_calls(message.content, tool_calls))
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIMessage>,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<Value>,
}
