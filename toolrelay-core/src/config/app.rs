use super::error::ConfigError;
use super::provider::ModelProviderConfig;
use super::server::ServerConfig;
use crate::application::tooling::CollisionPolicy;
use crate::constants::{
    DEFAULT_COMPACT_THRESHOLD, DEFAULT_KEEP_RECENT, DEFAULT_MAX_TOOL_ROUNDS,
};
use serde::Deserialize;
use std::path::Path;

/// How tools are offered to the model and how its calls are read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallMode {
    /// Tools are sent as function definitions and calls arrive as structured
    /// tool calls.
    #[default]
    Native,
    /// Tools are described in the system prompt and the model answers with a
    /// JSON action object.
    Directive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub max_tool_rounds: usize,
    pub tool_call_mode: ToolCallMode,
    pub concurrent_tools: bool,
    /// Restricts the agent to these tool names when set.
    pub tools: Option<Vec<String>>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            tool_call_mode: ToolCallMode::default(),
            concurrent_tools: true,
            tools: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptSettings {
    pub compact_threshold: usize,
    pub keep_recent: usize,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            keep_recent: DEFAULT_KEEP_RECENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistrySettings {
    pub collision: CollisionPolicy,
}

/// Application configuration loaded from client.toml
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub default_provider: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub builtin_tools: bool,
    pub agent: AgentSettings,
    pub transcript: TranscriptSettings,
    pub registry: RegistrySettings,
    pub providers: Vec<ModelProviderConfig>,
    pub servers: Vec<ServerConfig>,
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }

    pub fn provider(&self, id: &str) -> Option<&ModelProviderConfig> {
        self.providers.iter().find(|provider| provider.id == id)
    }

    pub fn mandatory_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|server| server.mandatory)
    }
}
