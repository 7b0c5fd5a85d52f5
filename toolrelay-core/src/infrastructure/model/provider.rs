//! Routing across configured model backends

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::factory::build_client;
use super::traits::{ModelClient, ModelProvider};
use super::types::{ModelError, ModelRequest, ModelResponse};
use crate::config::ModelProviderConfig;

struct Backend {
    /// Models this backend accepts. Empty accepts any model.
    models: HashSet<String>,
    client: Box<dyn ModelClient>,
}

/// Routes each request to the backend named by `request.provider`.
#[derive(Default)]
pub struct DynamicModelProvider {
    backends: HashMap<String, Backend>,
}

impl DynamicModelProvider {
    pub fn from_configs(configs: &[ModelProviderConfig]) -> Self {
        configs.iter().fold(Self::default(), |provider, config| {
            let models = config.models.iter().map(|m| m.name.clone()).collect();
            provider.with_client(models, build_client(config))
        })
    }

    /// Add or replace the backend registered under `client.id()`.
    pub fn with_client(mut self, models: HashSet<String>, client: Box<dyn ModelClient>) -> Self {
        self.backends
            .insert(client.id().to_string(), Backend { models, client });
        self
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.backends.contains_key(provider)
    }
}

#[async_trait]
impl ModelProvider for DynamicModelProvider {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let Some(backend) = self.backends.get(&request.provider) else {
            return Err(ModelError::provider_not_found(&request.provider));
        };
        if !backend.models.is_empty() && !backend.models.contains(&request.model) {
            return Err(ModelError::model_not_found(&request.provider, &request.model));
        }

        debug!(provider = %request.provider, model = %request.model, "Routing model request");
        backend.client.chat(request).await
    }
}
