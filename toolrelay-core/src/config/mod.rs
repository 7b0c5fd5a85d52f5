pub mod app;
pub mod error;
pub mod loader;
pub mod provider;
pub mod server;

pub use crate::constants::CONFIG_PATH;

pub use app::{AgentSettings, AppConfig, RegistrySettings, ToolCallMode, TranscriptSettings};
pub use error::ConfigError;
pub use loader::{ensure_env_loaded, load_config, parse_config};
pub use provider::{ApiFormat, ModelInfo, ModelProviderConfig};
pub use server::{HttpServer, ServerConfig, ServerTransport, StdioServer};
