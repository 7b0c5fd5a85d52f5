use super::runner::Agent;
use crate::application::tooling::{HandshakeInfo, ProviderError, ToolProvider, ToolRegistry};
use crate::domain::{ToolDescriptor, ToolInvocation, ToolPayload, ToolResult};
use crate::infrastructure::model::ModelProvider;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

/// Exposes a whole [`Agent`] run as a single tool taking `{"input": string}`.
///
/// Each call starts from an empty history against the registry given here,
/// so the delegate never sees the calling conversation.
pub struct AgentTool<P: ModelProvider> {
    id: String,
    descriptor: ToolDescriptor,
    agent: Arc<Agent<P>>,
    registry: Arc<ToolRegistry>,
}

impl<P: ModelProvider> AgentTool<P> {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        agent: Arc<Agent<P>>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        let name = name.into();
        let descriptor = ToolDescriptor::new(
            name.clone(),
            description,
            json!({
                "type": "object",
                "properties": {
                    "input": {"type": "string", "description": "Request for the agent"}
                },
                "required": ["input"]
            }),
        );
        Self {
            id: name,
            descriptor,
            agent,
            registry,
        }
    }
}

#[async_trait]
impl<P: ModelProvider + 'static> ToolProvider for AgentTool<P> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn initialize(&self) -> Result<HandshakeInfo, ProviderError> {
        Ok(HandshakeInfo {
            server_name: Some(self.id.clone()),
            ..HandshakeInfo::default()
        })
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        Ok(vec![self.descriptor.clone()])
    }

    async fn call_tool(&self, invocation: ToolInvocation) -> ToolResult {
        if invocation.tool_name != self.descriptor.name {
            return ToolResult::error(
                invocation.invocation_id,
                format!("unknown tool requested: {}", invocation.tool_name),
            );
        }
        let Some(input) = invocation.arguments.get("input").and_then(Value::as_str) else {
            return ToolResult::error(invocation.invocation_id, "missing string field 'input'");
        };

        debug!(tool = %self.id, invocation = %invocation.invocation_id, "Delegating to agent");
        match self.agent.run(&self.registry, &[], input).await {
            Ok(outcome) => {
                ToolResult::success(invocation.invocation_id, ToolPayload::Text(outcome.response))
            }
            Err(err) => {
                warn!(tool = %self.id, %err, "Delegated agent run failed");
                ToolResult::error(invocation.invocation_id, err.user_message())
            }
        }
    }
}
