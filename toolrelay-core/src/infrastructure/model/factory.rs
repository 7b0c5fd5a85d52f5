//! Client construction from `[[providers]]` entries

use super::clients::{OllamaClient, OpenAIClient};
use super::traits::ModelClient;
use crate::config::{ApiFormat, ModelProviderConfig};
use std::env;
use tracing::{debug, warn};

/// Read the API key from the environment variable the entry names.
///
/// `None` when the entry names no variable or the variable is unset. The
/// latter is logged, since the provider will usually reject the request.
pub fn api_key_from_env(config: &ModelProviderConfig) -> Option<String> {
    let var = config.api_key.as_deref().map(str::trim).filter(|var| !var.is_empty())?;
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => {
            warn!(provider = %config.id, env_var = var, "API key environment variable is not set");
            None
        }
    }
}

/// Build the client matching the entry's wire format.
pub fn build_client(config: &ModelProviderConfig) -> Box<dyn ModelClient> {
    debug!(provider = %config.id, format = ?config.format, endpoint = %config.endpoint, "Building model client");
    match config.format {
        ApiFormat::Ollama => Box::new(OllamaClient::from_config(config)),
        ApiFormat::OpenAi => Box::new(OpenAIClient::from_config(config)),
    }
}
