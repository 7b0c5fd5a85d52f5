use super::error::ProviderError;
use crate::domain::{ToolDescriptor, ToolInvocation, ToolResult};
use async_trait::async_trait;
use serde_json::Value;

/// What a provider reported when its session was established.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandshakeInfo {
    pub protocol_version: String,
    pub server_name: Option<String>,
    pub server_version: Option<String>,
    pub instructions: Option<String>,
    pub capabilities: Value,
}

impl HandshakeInfo {
    pub fn from_result(result: &Value) -> Self {
        let text = |pointer: &str| {
            result
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            protocol_version: text("/protocolVersion").unwrap_or_default(),
            server_name: text("/serverInfo/name"),
            server_version: text("/serverInfo/version"),
            instructions: text("/instructions"),
            capabilities: result.get("capabilities").cloned().unwrap_or(Value::Null),
        }
    }
}

/// A source of callable tools.
///
/// `call_tool` never fails: every execution problem is reported as a
/// [`ToolResult`] with `is_error` set so one broken tool cannot abort a
/// dispatch round.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Establish the session. Repeated calls are no-ops.
    async fn initialize(&self) -> Result<HandshakeInfo, ProviderError>;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError>;

    async fn call_tool(&self, invocation: ToolInvocation) -> ToolResult;

    /// Usage guidance the provider published during the handshake.
    async fn instructions(&self) -> Option<String> {
        None
    }

    /// Set when the provider announced that its tool list changed.
    fn catalog_changed(&self) -> bool {
        false
    }

    async fn shutdown(&self) {}
}
