//! JSON-RPC 2.0 transports for remote tool providers.

mod http;
mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use super::error::ProviderError;
use async_trait::async_trait;
use serde_json::{Value, json};

pub const PROTOCOL_VERSION: &str = "2025-06-18";

pub(crate) const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

/// Moves JSON-RPC messages to and from one tool server.
///
/// Transports know nothing about the MCP session. They frame requests, match
/// responses to them, and answer the few server-initiated requests a client
/// must handle.
#[async_trait]
pub trait Transport: Send + Sync {
    fn server(&self) -> &str;

    /// Make the server reachable, starting it if needed.
    async fn connect(&self) -> Result<(), ProviderError>;

    /// False once the underlying connection is gone and a new session is needed.
    async fn is_alive(&self) -> bool {
        true
    }

    /// Send a request and return the `result` member of its response.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    async fn notify(&self, method: &str, params: Value) -> Result<(), ProviderError>;

    /// Whether the server sent `notifications/tools/list_changed` since the
    /// last [`Transport::acknowledge_catalog`].
    fn catalog_changed(&self) -> bool {
        false
    }

    fn acknowledge_catalog(&self) {}

    async fn close(&self);
}

pub(crate) fn request_message(id: &str, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

pub(crate) fn notification_message(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
}

/// Unwrap a response envelope into its result, mapping JSON-RPC errors.
pub(crate) fn response_result(server: &str, envelope: Value) -> Result<Value, ProviderError> {
    if let Some(error) = envelope.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32000);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(ProviderError::Rpc {
            server: server.to_string(),
            code,
            message,
        });
    }
    match envelope {
        Value::Object(mut map) => map.remove("result").ok_or_else(|| ProviderError::Protocol {
            server: server.to_string(),
            message: "response carries neither result nor error".to_string(),
        }),
        _ => Err(ProviderError::Protocol {
            server: server.to_string(),
            message: "response is not a JSON object".to_string(),
        }),
    }
}

/// JSON-RPC ids are echoed back as strings or numbers depending on the server.
pub(crate) fn response_key(id: &Value) -> Option<String> {
    match id {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
