use super::app::{AgentSettings, AppConfig, RegistrySettings, ToolCallMode, TranscriptSettings};
use super::error::ConfigError;
use super::provider::{ModelProviderConfig, RawProviderConfig};
use super::server::{RawServer, ServerConfig};
use crate::application::tooling::CollisionPolicy;
use crate::constants::{CONFIG_PATH, ENV_PATH};
use dotenvy::from_filename;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;
use tracing::debug;

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
pub(super) struct RawConfig {
    pub model: Option<String>,
    pub default_provider: Option<String>,
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub builtin_tools: Option<bool>,
    #[serde(default)]
    pub agent: RawAgent,
    #[serde(default)]
    pub transcript: RawTranscript,
    #[serde(default)]
    pub registry: RawRegistry,
    #[serde(default)]
    pub providers: Vec<RawProviderConfig>,
    #[serde(default)]
    pub servers: Vec<RawServer>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawAgent {
    pub max_tool_rounds: Option<usize>,
    pub tool_call_mode: Option<ToolCallMode>,
    pub concurrent_tools: Option<bool>,
    pub tools: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawTranscript {
    pub compact_threshold: Option<usize>,
    pub keep_recent: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawRegistry {
    pub collision: Option<CollisionPolicy>,
}

/// Ensures environment variables are loaded from config/.env
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename(ENV_PATH);
    });
}

/// Load and validate configuration from a file path
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    let config_path = path.unwrap_or_else(|| Path::new(CONFIG_PATH));
    read_config(config_path)
}

/// Parse configuration from TOML text. `origin` is only used in errors.
pub fn parse_config(content: &str, origin: &Path) -> Result<AppConfig, ConfigError> {
    let parsed: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    validate_and_build(parsed)
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading client configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    parse_config(&content, path)
}

fn validate_and_build(parsed: RawConfig) -> Result<AppConfig, ConfigError> {
    let model = parsed.model.ok_or(ConfigError::MissingModel)?;
    let default_provider = parsed
        .default_provider
        .ok_or(ConfigError::MissingDefaultProvider)?;

    if parsed.providers.is_empty() {
        return Err(ConfigError::NoProvidersConfigured);
    }

    let mut providers: Vec<ModelProviderConfig> = Vec::new();
    for raw_provider in parsed.providers {
        if raw_provider.endpoint.is_none() {
            return Err(ConfigError::MissingEndpoint {
                provider: raw_provider.id.clone(),
            });
        }
        providers.push(ModelProviderConfig::from(raw_provider));
    }
    if !providers.iter().any(|p| p.id == default_provider) {
        return Err(ConfigError::ProviderNotFound {
            provider: default_provider,
        });
    }
    if let Some(provider) = providers.iter_mut().find(|p| p.id == default_provider) {
        provider.ensure_model(&model);
    }

    let mut seen = HashSet::new();
    let mut servers = Vec::with_capacity(parsed.servers.len());
    for raw_server in parsed.servers {
        let server = ServerConfig::try_from(raw_server)?;
        if !seen.insert(server.name.clone()) {
            return Err(ConfigError::DuplicateServer {
                server: server.name,
            });
        }
        servers.push(server);
    }

    let defaults = AgentSettings::default();
    let agent = AgentSettings {
        max_tool_rounds: parsed.agent.max_tool_rounds.unwrap_or(defaults.max_tool_rounds),
        tool_call_mode: parsed.agent.tool_call_mode.unwrap_or(defaults.tool_call_mode),
        concurrent_tools: parsed
            .agent
            .concurrent_tools
            .unwrap_or(defaults.concurrent_tools),
        tools: parsed.agent.tools,
    };
    if agent.max_tool_rounds == 0 {
        return Err(ConfigError::InvalidSetting {
            key: "agent.max_tool_rounds".to_string(),
            reason: "must allow at least one tool round".to_string(),
        });
    }

    let defaults = TranscriptSettings::default();
    let transcript = TranscriptSettings {
        compact_threshold: parsed
            .transcript
            .compact_threshold
            .unwrap_or(defaults.compact_threshold),
        keep_recent: parsed.transcript.keep_recent.unwrap_or(defaults.keep_recent),
    };
    if transcript.keep_recent < 2 {
        return Err(ConfigError::InvalidSetting {
            key: "transcript.keep_recent".to_string(),
            reason: "must keep at least one user/assistant round trip".to_string(),
        });
    }
    if transcript.compact_threshold <= transcript.keep_recent {
        return Err(ConfigError::InvalidSetting {
            key: "transcript.compact_threshold".to_string(),
            reason: "must be greater than transcript.keep_recent".to_string(),
        });
    }

    Ok(AppConfig {
        default_provider,
        model,
        system_prompt: parsed.system_prompt,
        builtin_tools: parsed.builtin_tools.unwrap_or(true),
        agent,
        transcript,
        registry: RegistrySettings {
            collision: parsed.registry.collision.unwrap_or_default(),
        },
        providers,
        servers,
    })
}
