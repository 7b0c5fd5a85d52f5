use super::error::ProviderError;
use super::interface::{HandshakeInfo, ToolProvider};
use super::transport::{PROTOCOL_VERSION, Transport};
use crate::domain::{ContentChunk, ToolDescriptor, ToolInvocation, ToolPayload, ToolResult};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Cursor pages followed by `tools/list` before the listing is cut short.
const MAX_LIST_PAGES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteTimeouts {
    pub handshake: Duration,
    pub call: Duration,
}

impl Default for RemoteTimeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_millis(crate::constants::DEFAULT_HANDSHAKE_TIMEOUT_MS),
            call: Duration::from_millis(crate::constants::DEFAULT_CALL_TIMEOUT_MS),
        }
    }
}

/// A tool server reached through a [`Transport`].
///
/// The session is created lazily by the first operation and is re-established
/// when the transport reports that the server went away.
pub struct RemoteProvider {
    id: String,
    transport: Arc<dyn Transport>,
    session: AsyncMutex<Option<HandshakeInfo>>,
    timeouts: RemoteTimeouts,
}

impl RemoteProvider {
    pub fn new(id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            id: id.into(),
            transport,
            session: AsyncMutex::new(None),
            timeouts: RemoteTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: RemoteTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub async fn is_initialized(&self) -> bool {
        self.session.lock().await.is_some()
    }

    async fn ensure_session(&self) -> Result<HandshakeInfo, ProviderError> {
        let mut session = self.session.lock().await;
        if let Some(info) = session.as_ref() {
            if self.transport.is_alive().await {
                return Ok(info.clone());
            }
            debug!(server = %self.id, "Tool server connection lost, starting a new session");
            *session = None;
        }

        let outcome = self
            .bounded("initialize", self.timeouts.handshake, self.handshake())
            .await;
        match outcome {
            Ok(info) => {
                info!(
                    server = %self.id,
                    protocol = %info.protocol_version,
                    server_name = info.server_name.as_deref().unwrap_or("unknown"),
                    "Tool server session established"
                );
                *session = Some(info.clone());
                Ok(info)
            }
            Err(err) => {
                self.transport.close().await;
                Err(err)
            }
        }
    }

    async fn handshake(&self) -> Result<HandshakeInfo, ProviderError> {
        self.transport.connect().await?;
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });
        let result = self.transport.request("initialize", params).await?;
        if !result.is_object() {
            return Err(ProviderError::Protocol {
                server: self.id.clone(),
                message: "initialize result is not an object".to_string(),
            });
        }
        let info = HandshakeInfo::from_result(&result);
        self.transport
            .notify("notifications/initialized", json!({}))
            .await?;
        Ok(info)
    }

    async fn bounded<T, F>(
        &self,
        operation: &str,
        limit: Duration,
        future: F,
    ) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(limit, future).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                server: self.id.clone(),
                operation: operation.to_string(),
                after: limit,
            }),
        }
    }

    async fn forget_session_after(&self, err: &ProviderError) {
        if err.invalidates_session() {
            self.session.lock().await.take();
        }
    }

    async fn invoke(&self, invocation: &ToolInvocation) -> Result<Value, ProviderError> {
        self.ensure_session().await?;
        let arguments = match &invocation.arguments {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        let params = json!({ "name": invocation.tool_name, "arguments": arguments });
        self.bounded(
            "tools/call",
            self.timeouts.call,
            self.transport.request("tools/call", params),
        )
        .await
    }
}

#[async_trait]
impl ToolProvider for RemoteProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn initialize(&self) -> Result<HandshakeInfo, ProviderError> {
        self.ensure_session().await
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        self.ensure_session().await?;
        self.transport.acknowledge_catalog();

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let page = self
                .bounded(
                    "tools/list",
                    self.timeouts.call,
                    self.transport.request("tools/list", params),
                )
                .await;
            let page = match page {
                Ok(page) => page,
                Err(err) => {
                    self.forget_session_after(&err).await;
                    return Err(err);
                }
            };

            let entries = page
                .get("tools")
                .and_then(Value::as_array)
                .ok_or_else(|| ProviderError::Protocol {
                    server: self.id.clone(),
                    message: "tools/list result has no tools array".to_string(),
                })?;
            tools.extend(entries.iter().filter_map(|entry| self.parse_descriptor(entry)));

            cursor = page
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|next| !next.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                return Ok(tools);
            }
        }

        warn!(server = %self.id, pages = MAX_LIST_PAGES, "Tool listing truncated");
        Ok(tools)
    }

    async fn call_tool(&self, invocation: ToolInvocation) -> ToolResult {
        match self.invoke(&invocation).await {
            Ok(result) => parse_call_result(invocation.invocation_id, result),
            Err(err) => {
                warn!(
                    server = %self.id,
                    tool = %invocation.tool_name,
                    %err,
                    "Remote tool call failed"
                );
                self.forget_session_after(&err).await;
                ToolResult::error(invocation.invocation_id, err.to_string())
            }
        }
    }

    async fn instructions(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .and_then(|info| info.instructions.clone())
    }

    fn catalog_changed(&self) -> bool {
        self.transport.catalog_changed()
    }

    async fn shutdown(&self) {
        self.session.lock().await.take();
        self.transport.close().await;
    }
}

impl RemoteProvider {
    fn parse_descriptor(&self, entry: &Value) -> Option<ToolDescriptor> {
        let Some(name) = entry
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
        else {
            warn!(server = %self.id, "Skipping listed tool without a name");
            return None;
        };
        let description = entry
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let schema = entry.get("inputSchema").cloned().unwrap_or(Value::Null);
        Some(ToolDescriptor::new(name, description, schema))
    }
}

/// Convert a `tools/call` result into a [`ToolResult`].
fn parse_call_result(invocation_id: String, result: Value) -> ToolResult {
    let Value::Object(result) = result else {
        return ToolResult::error(invocation_id, "malformed tools/call result");
    };
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let chunks: Vec<ContentChunk> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| blocks.iter().map(content_chunk).collect())
        .unwrap_or_default();

    let payload = if !chunks.is_empty() {
        ToolPayload::Content(chunks)
    } else if let Some(structured) = result.get("structuredContent") {
        ToolPayload::Structured(structured.clone())
    } else {
        ToolPayload::Text(String::new())
    };

    ToolResult {
        invocation_id,
        payload,
        is_error,
    }
}

fn content_chunk(block: &Value) -> ContentChunk {
    let kind = block.get("type").and_then(Value::as_str).unwrap_or_default();
    let text = |value: &str| ContentChunk::Text {
        text: value.to_string(),
    };
    match kind {
        "text" => text(block.get("text").and_then(Value::as_str).unwrap_or_default()),
        "image" | "audio" => {
            let mime_type = block
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("application/octet-stream")
                .to_string();
            let decoded = block
                .get("data")
                .and_then(Value::as_str)
                .map(|data| STANDARD.decode(data));
            match decoded {
                Some(Ok(data)) => ContentChunk::Binary { mime_type, data },
                _ => text(&format!("[undecodable {kind} content: {mime_type}]")),
            }
        }
        "resource" => {
            let resource = block.get("resource").cloned().unwrap_or(Value::Null);
            match resource.get("text").and_then(Value::as_str) {
                Some(body) => text(body),
                None => {
                    let uri = resource.get("uri").and_then(Value::as_str).unwrap_or("?");
                    text(&format!("[resource: {uri}]"))
                }
            }
        }
        "resource_link" => {
            let uri = block.get("uri").and_then(Value::as_str).unwrap_or("?");
            text(&format!("[resource: {uri}]"))
        }
        _ => text(&block.to_string()),
    }
}
