use super::error::RegistryError;
use super::interface::ToolProvider;
use crate::application::schema::{CallSignature, translate_schema};
use crate::domain::{ToolDescriptor, ToolInvocation, ToolResult};
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a tool name already taken by another provider is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The most recently registered provider takes the name.
    #[default]
    LastWins,
    /// Every tool is exposed as `<provider>__<tool>`, so names never collide.
    Namespace,
}

/// A tool in the registry, with its translated signature and owner.
#[derive(Clone)]
pub struct RegisteredTool {
    /// Descriptor carrying the name the model sees.
    pub descriptor: ToolDescriptor,
    pub signature: CallSignature,
    /// Name the provider itself knows the tool by.
    pub remote_name: String,
    provider: Arc<dyn ToolProvider>,
}

impl RegisteredTool {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    pub fn provider(&self) -> &Arc<dyn ToolProvider> {
        &self.provider
    }

    /// Forward an invocation to the owning provider under its local name.
    pub async fn call(&self, invocation: ToolInvocation) -> ToolResult {
        let invocation = ToolInvocation {
            tool_name: self.remote_name.clone(),
            ..invocation
        };
        self.provider.call_tool(invocation).await
    }
}

/// Unique-by-name index of every callable tool.
///
/// Dispatch reads an immutable registry. Changing the set of tools means
/// building a new registry (see [`ToolRegistry::reload`]) and swapping it in
/// between turns.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    policy: CollisionPolicy,
    providers: Vec<Arc<dyn ToolProvider>>,
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    /// Initialize `provider`, list its tools and add them.
    ///
    /// Registration is all-or-nothing: if the provider fails to initialize or
    /// list, the registry is left untouched. Returns the number of tools added.
    pub async fn register(&mut self, provider: Arc<dyn ToolProvider>) -> Result<usize, RegistryError> {
        let provider_id = provider.id().to_string();
        let wrap = |source| RegistryError::Provider {
            provider: provider_id.clone(),
            source,
        };
        provider.initialize().await.map_err(wrap)?;
        let descriptors = provider.list_tools().await.map_err(wrap)?;

        let entries: Vec<RegisteredTool> = descriptors
            .into_iter()
            .map(|descriptor| self.prepare(&provider, descriptor))
            .collect();

        self.drop_provider(&provider_id);
        let added = entries.len();
        for entry in entries {
            self.insert(entry);
        }
        self.providers.push(provider);

        info!(provider = %provider_id, tools = added, "Registered tool provider");
        Ok(added)
    }

    fn prepare(&self, provider: &Arc<dyn ToolProvider>, descriptor: ToolDescriptor) -> RegisteredTool {
        let remote_name = descriptor.name.clone();
        let public_name = match self.policy {
            CollisionPolicy::LastWins => remote_name.clone(),
            CollisionPolicy::Namespace => namespaced(provider.id(), &remote_name),
        };
        let signature = translate_schema(&public_name, &descriptor.input_schema);
        RegisteredTool {
            descriptor: ToolDescriptor {
                name: public_name,
                ..descriptor
            },
            signature,
            remote_name,
            provider: Arc::clone(provider),
        }
    }

    fn insert(&mut self, entry: RegisteredTool) {
        match self.index.get(entry.name()) {
            Some(&slot) => {
                let previous = &self.tools[slot];
                if previous.provider_id() != entry.provider_id() {
                    warn!(
                        tool = entry.name(),
                        previous = previous.provider_id(),
                        provider = entry.provider_id(),
                        "Tool name collision, later provider wins"
                    );
                } else {
                    debug!(tool = entry.name(), "Provider listed the same tool twice");
                }
                self.tools[slot] = entry;
            }
            None => {
                self.index.insert(entry.name().to_string(), self.tools.len());
                self.tools.push(entry);
            }
        }
    }

    /// Remove everything a provider contributed, for re-registration.
    fn drop_provider(&mut self, provider_id: &str) {
        if !self.providers.iter().any(|p| p.id() == provider_id) {
            return;
        }
        self.providers.retain(|p| p.id() != provider_id);
        self.tools.retain(|tool| tool.provider_id() != provider_id);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .tools
            .iter()
            .enumerate()
            .map(|(slot, tool)| (tool.name().to_string(), slot))
            .collect();
    }

    /// A copy exposing only the tools named in `allowed`. Providers that keep
    /// no tool are left out, so their guidance is not shown either.
    pub fn restricted(&self, allowed: &[String]) -> ToolRegistry {
        let tools: Vec<RegisteredTool> = self
            .tools
            .iter()
            .filter(|tool| allowed.iter().any(|name| name == tool.name()))
            .cloned()
            .collect();
        let providers = self
            .providers
            .iter()
            .filter(|provider| tools.iter().any(|tool| tool.provider_id() == provider.id()))
            .cloned()
            .collect();
        let mut scoped = ToolRegistry {
            policy: self.policy,
            providers,
            tools,
            index: HashMap::new(),
        };
        scoped.reindex();
        scoped
    }

    /// Exact-name lookup.
    pub fn resolve(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&slot| &self.tools[slot])
    }

    /// Descriptors of every tool, in registration order, as the model sees them.
    pub fn snapshot(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|tool| tool.descriptor.clone()).collect()
    }

    pub fn tools(&self) -> &[RegisteredTool] {
        &self.tools
    }

    pub fn providers(&self) -> &[Arc<dyn ToolProvider>] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// True when any provider announced a changed tool list.
    pub fn is_stale(&self) -> bool {
        self.providers.iter().any(|provider| provider.catalog_changed())
    }

    /// Build a fresh registry from the same providers, re-listing their tools.
    /// A provider that fails to list is kept out and logged.
    pub async fn reload(&self) -> ToolRegistry {
        let mut next = ToolRegistry::new(self.policy);
        for provider in &self.providers {
            if let Err(err) = next.register(Arc::clone(provider)).await {
                warn!(provider = provider.id(), %err, "Provider dropped during reload");
            }
        }
        next
    }

    /// Usage guidance from every provider that published some, keyed by id.
    pub async fn instructions(&self) -> Vec<(String, String)> {
        let guidance = join_all(self.providers.iter().map(|provider| async move {
            provider
                .instructions()
                .await
                .map(|text| (provider.id().to_string(), text))
        }))
        .await;
        guidance.into_iter().flatten().collect()
    }

    pub async fn shutdown(&self) {
        join_all(self.providers.iter().map(|provider| provider.shutdown())).await;
    }
}

/// Longest tool name model APIs accept.
const MAX_TOOL_NAME: usize = 64;

/// `<provider>__<tool>`, limited to `[A-Za-z0-9_-]` and [`MAX_TOOL_NAME`] characters.
fn namespaced(provider: &str, tool: &str) -> String {
    format!("{provider}__{tool}")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(MAX_TOOL_NAME)
        .collect()
}
