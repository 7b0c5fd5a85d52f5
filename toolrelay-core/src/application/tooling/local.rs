use super::error::ProviderError;
use super::interface::{HandshakeInfo, ToolProvider};
use crate::application::schema::{CallSignature, translate_schema};
use crate::domain::{ToolDescriptor, ToolInvocation, ToolPayload, ToolResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Async implementation behind a local tool. An `Err` is reported to the model
/// as an error result.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<ToolPayload, String>> + Send + Sync>;

struct LocalTool {
    descriptor: ToolDescriptor,
    signature: CallSignature,
    handler: ToolHandler,
}

/// Provider for tools implemented in this process.
///
/// Arguments are validated against the tool's own signature before the
/// handler runs, and each handler runs on its own task so a panic surfaces as
/// an error result instead of unwinding into the dispatch loop.
pub struct LocalProvider {
    id: String,
    tools: Vec<LocalTool>,
    index: HashMap<String, usize>,
}

impl LocalProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_tool<F, Fut>(mut self, descriptor: ToolDescriptor, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolPayload, String>> + Send + 'static,
    {
        let handler: ToolHandler = Arc::new(move |args| Box::pin(handler(args)));
        self.insert(descriptor, handler);
        self
    }

    pub fn with_sync_tool<F>(self, descriptor: ToolDescriptor, handler: F) -> Self
    where
        F: Fn(Value) -> Result<ToolPayload, String> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.with_tool(descriptor, move |args| {
            let handler = Arc::clone(&handler);
            async move { handler(args) }
        })
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn insert(&mut self, descriptor: ToolDescriptor, handler: ToolHandler) {
        let signature = translate_schema(&descriptor.name, &descriptor.input_schema);
        let tool = LocalTool {
            descriptor,
            signature,
            handler,
        };
        match self.index.get(&tool.descriptor.name) {
            Some(&slot) => {
                warn!(provider = %self.id, tool = %tool.descriptor.name, "Replacing duplicate local tool");
                self.tools[slot] = tool;
            }
            None => {
                self.index
                    .insert(tool.descriptor.name.clone(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }
}

#[async_trait]
impl ToolProvider for LocalProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn initialize(&self) -> Result<HandshakeInfo, ProviderError> {
        Ok(HandshakeInfo {
            protocol_version: "local".to_string(),
            server_name: Some(self.id.clone()),
            ..HandshakeInfo::default()
        })
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        Ok(self
            .tools
            .iter()
            .map(|tool| tool.descriptor.clone())
            .collect())
    }

    async fn call_tool(&self, invocation: ToolInvocation) -> ToolResult {
        let ToolInvocation {
            invocation_id,
            tool_name,
            arguments,
        } = invocation;

        let Some(tool) = self.index.get(&tool_name).map(|&slot| &self.tools[slot]) else {
            return ToolResult::error(
                invocation_id,
                format!("tool '{tool_name}' is not provided by '{}'", self.id),
            );
        };

        if let Err(err) = tool.signature.validate(&arguments) {
            debug!(tool = %tool_name, error = %err, "Rejected local tool call");
            return ToolResult::error(invocation_id, err.to_string());
        }

        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments
        };

        let handler = Arc::clone(&tool.handler);
        match tokio::spawn(async move { handler(arguments).await }).await {
            Ok(Ok(payload)) => ToolResult::success(invocation_id, payload),
            Ok(Err(message)) => ToolResult::error(invocation_id, message),
            Err(join_err) => {
                warn!(tool = %tool_name, error = %join_err, "Local tool aborted");
                let reason = if join_err.is_panic() {
                    "panicked"
                } else {
                    "was cancelled"
                };
                ToolResult::error(invocation_id, format!("tool '{tool_name}' {reason}"))
            }
        }
    }
}
