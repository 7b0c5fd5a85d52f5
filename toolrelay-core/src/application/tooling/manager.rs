use super::error::RegistryError;
use super::interface::ToolProvider;
use super::registry::ToolRegistry;
use super::remote::{RemoteProvider, RemoteTimeouts};
use super::transport::{HttpTransport, StdioTransport, Transport};
use crate::config::{ServerConfig, ServerTransport};
use std::sync::Arc;
use tracing::{info, warn};

/// Builds remote providers from configured servers and registers them.
pub struct ServerManager {
    configs: Vec<ServerConfig>,
}

impl ServerManager {
    pub fn new(configs: Vec<ServerConfig>) -> Self {
        Self { configs }
    }

    pub fn configs(&self) -> &[ServerConfig] {
        &self.configs
    }

    pub fn provider_for(config: &ServerConfig) -> Arc<dyn ToolProvider> {
        let transport: Arc<dyn Transport> = match &config.transport {
            ServerTransport::Stdio(spec) => {
                Arc::new(StdioTransport::new(config.name.clone(), spec.clone()))
            }
            ServerTransport::Http(spec) => {
                Arc::new(HttpTransport::new(config.name.clone(), spec.clone()))
            }
        };
        let timeouts = RemoteTimeouts {
            handshake: config.handshake_timeout,
            call: config.call_timeout,
        };
        Arc::new(RemoteProvider::new(config.name.clone(), transport).with_timeouts(timeouts))
    }

    /// Register every configured server. A mandatory server that fails aborts
    /// with its error; any other failure is logged and the server skipped.
    /// Returns the names of skipped servers.
    pub async fn register_all(&self, registry: &mut ToolRegistry) -> Result<Vec<String>, RegistryError> {
        let mut skipped = Vec::new();
        for config in &self.configs {
            let provider = Self::provider_for(config);
            match registry.register(Arc::clone(&provider)).await {
                Ok(count) => {
                    info!(server = %config.name, tools = count, "Tool server ready");
                }
                Err(err) if config.mandatory => {
                    provider.shutdown().await;
                    return Err(err);
                }
                Err(err) => {
                    warn!(server = %config.name, %err, "Skipping unavailable tool server");
                    provider.shutdown().await;
                    skipped.push(config.name.clone());
                }
            }
        }
        Ok(skipped)
    }
}
