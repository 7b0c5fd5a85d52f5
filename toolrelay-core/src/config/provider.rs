//! # Provider Configuration
//!
//! Model provider entries from `[[providers]]`.
//!
//! | Type | Description | API Key Required |
//! |------|-------------|-----------------|
//! | `openai` | OpenAI-compatible chat completions | Usually |
//! | `ollama`, `localai` | Local Ollama server | No |
//!
//! Any other `type` is treated as OpenAI-compatible.

use serde::Deserialize;

/// Wire format a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiFormat {
    #[default]
    OpenAi,
    Ollama,
}

impl ApiFormat {
    pub fn from_type(provider_type: &str) -> Self {
        match provider_type.trim().to_ascii_lowercase().as_str() {
            "ollama" | "localai" => ApiFormat::Ollama,
            _ => ApiFormat::OpenAi,
        }
    }

    /// Chat path below the endpoint when the entry sets no `api_path`.
    pub fn default_chat_path(self) -> &'static str {
        match self {
            ApiFormat::OpenAi => "/v1/chat/completions",
            ApiFormat::Ollama => "/api/chat",
        }
    }
}

/// A model offered by a provider, optionally with a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: Option<String>,
}

/// Connection details for one model provider.
///
/// ```toml
/// [[providers]]
/// id = "openai"
/// type = "openai"
/// endpoint = "https://api.openai.com"
/// api_key = "OPENAI_API_KEY"
/// models = ["gpt-4o-mini", { name = "gpt-4o", display_name = "GPT-4o" }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProviderConfig {
    pub id: String,
    pub format: ApiFormat,
    pub endpoint: String,
    /// Name of the environment variable holding the API key
    pub api_key: Option<String>,
    /// Override for the request path below `endpoint`
    pub api_path: Option<String>,
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct RawProviderConfig {
    pub(super) id: String,
    #[serde(rename = "type", default)]
    pub(super) provider_type: String,
    pub(super) endpoint: Option<String>,
    pub(super) api_key: Option<String>,
    #[serde(default)]
    pub(super) api_path: Option<String>,
    #[serde(default)]
    pub(super) models: Vec<RawModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum RawModelInfo {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        display_name: Option<String>,
    },
}

impl From<RawModelInfo> for ModelInfo {
    fn from(value: RawModelInfo) -> Self {
        match value {
            RawModelInfo::Name(name) => Self {
                name,
                display_name: None,
            },
            RawModelInfo::Detailed { name, display_name } => Self { name, display_name },
        }
    }
}

impl From<RawProviderConfig> for ModelProviderConfig {
    fn from(raw: RawProviderConfig) -> Self {
        Self {
            id: raw.id,
            format: ApiFormat::from_type(&raw.provider_type),
            endpoint: raw.endpoint.unwrap_or_default(),
            api_key: raw.api_key,
            api_path: raw.api_path,
            models: raw.models.into_iter().map(ModelInfo::from).collect(),
        }
    }
}

impl ModelProviderConfig {
    /// Ensure a model exists in this provider's model list
    pub fn ensure_model(&mut self, model: &str) {
        if self.models.iter().all(|info| info.name != model) {
            self.models.push(ModelInfo {
                name: model.to_string(),
                display_name: None,
            });
        }
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.models.iter().any(|info| info.name == model)
    }

    pub fn chat_path(&self) -> &str {
        self.api_path
            .as_deref()
            .unwrap_or(self.format.default_chat_path())
    }
}
