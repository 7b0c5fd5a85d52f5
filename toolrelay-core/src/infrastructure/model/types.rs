//! Model types - Request, Response, and Error types

use crate::config::ToolCallMode;
use crate::domain::{ToolCallIntent, Turn};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// A tool offered to the model, with its parameters as a strict JSON schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Value,
}

/// Model request for LLM chat
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub provider: String,
    pub model: String,
    pub system: String,
    pub messages: Vec<Turn>,
    /// Sent as function definitions in native mode, ignored otherwise.
    pub tools: Vec<ToolSpec>,
    pub tool_call_mode: ToolCallMode,
}

/// Model response from LLM. Either part may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallIntent>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(text: Option<String>, tool_calls: Vec<ToolCallIntent>) -> Self {
        Self { text, tool_calls }
    }

    /// Text with surrounding whitespace removed, `None` when blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("provider '{provider}' is not configured")]
    ProviderNotFound { provider: String },
    #[error("model '{model}' is not available for provider '{provider}'")]
    ModelNotFound { provider: String, model: String },
    #[error("provider '{provider}' requires an API key")]
    MissingApiKey { provider: String },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ModelError {
    pub fn provider_not_found(provider: impl Into<String>) -> Self {
        Self::ProviderNotFound {
            provider: provider.into(),
        }
    }

    pub fn model_not_found(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            provider: provider.into(),
            model: model.into(),
        }
    }

    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Message suitable for showing to the person at the prompt.
    pub fn user_message(&self) -> String {
        match self {
            ModelError::ProviderNotFound { provider } => {
                format!("Model provider '{provider}' is not configured. Check client.toml.")
            }
            ModelError::ModelNotFound { provider, model } => {
                format!("Model '{model}' is not available from provider '{provider}'.")
            }
            ModelError::MissingApiKey { provider } => {
                format!("Provider '{provider}' needs an API key.")
            }
            ModelError::Network { provider, source } => {
                if source.is_connect() {
                    format!("Cannot reach model provider '{provider}'.")
                } else if source.is_timeout() {
                    format!("Request to '{provider}' timed out.")
                } else if let Some(status) = source.status() {
                    match status {
                        StatusCode::NOT_FOUND => format!("Endpoint of '{provider}' was not found."),
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            format!("Provider '{provider}' rejected the API key.")
                        }
                        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                            format!("Provider '{provider}' is temporarily unavailable.")
                        }
                        _ => format!("Request to '{provider}' failed: {}", status.as_u16()),
                    }
                } else {
                    format!("Network error talking to '{provider}'.")
                }
            }
            ModelError::InvalidResponse { provider, .. } => {
                format!("Provider '{provider}' sent a response that could not be read.")
            }
        }
    }
}
