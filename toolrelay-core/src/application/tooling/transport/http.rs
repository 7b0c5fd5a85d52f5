use super::{
    PROTOCOL_VERSION, TOOLS_LIST_CHANGED, Transport, notification_message, request_message,
    response_key, response_result,
};
use crate::application::tooling::error::ProviderError;
use crate::config::HttpServer;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

const SESSION_HEADER: &str = "Mcp-Session-Id";
const PROTOCOL_HEADER: &str = "MCP-Protocol-Version";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// JSON-RPC over HTTP POST, one request per call.
///
/// The server may answer with a plain JSON body or with a short
/// `text/event-stream` whose `data:` events carry the response. A session id
/// handed out by the server is echoed on every later request and released with
/// `DELETE` on close.
pub struct HttpTransport {
    name: String,
    spec: HttpServer,
    http: Client,
    session_id: AsyncMutex<Option<String>>,
    id_counter: AtomicU64,
    catalog_changed: AtomicBool,
}

impl HttpTransport {
    pub fn new(name: impl Into<String>, spec: HttpServer) -> Self {
        Self::with_client(name, spec, Client::new())
    }

    pub fn with_client(name: impl Into<String>, spec: HttpServer, http: Client) -> Self {
        Self {
            name: name.into(),
            spec,
            http,
            session_id: AsyncMutex::new(None),
            id_counter: AtomicU64::new(1),
            catalog_changed: AtomicBool::new(false),
        }
    }

    pub async fn session_id(&self) -> Option<String> {
        self.session_id.lock().await.clone()
    }

    async fn decorate(&self, mut builder: RequestBuilder) -> RequestBuilder {
        for (key, value) in &self.spec.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(session) = self.session_id.lock().await.as_deref() {
            builder = builder
                .header(SESSION_HEADER, session)
                .header(PROTOCOL_HEADER, PROTOCOL_VERSION);
        }
        builder
    }

    async fn post(&self, body: &Value) -> Result<Response, ProviderError> {
        let sent_session = self.session_id.lock().await.clone();
        let builder = self
            .http
            .post(&self.spec.url)
            .header(ACCEPT, ACCEPT_BOTH)
            .json(body);
        let response = self
            .decorate(builder)
            .await
            .send()
            .await
            .map_err(|err| self.map_send_error(err))?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            let mut current = self.session_id.lock().await;
            if current.as_deref() != Some(session) {
                debug!(server = %self.name, session, "Tool server assigned session");
                *current = Some(session.to_string());
            }
        }

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            if let Some(sent) = sent_session {
                let mut current = self.session_id.lock().await;
                if current.as_deref() == Some(sent.as_str()) {
                    *current = None;
                }
                warn!(server = %self.name, session = %sent, "Tool server no longer knows the session");
                return Err(ProviderError::SessionExpired {
                    server: self.name.clone(),
                });
            }
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transport {
                server: self.name.clone(),
                message: format!("HTTP {status}: {}", body.trim()),
            });
        }
        Ok(response)
    }

    fn map_send_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_connect() {
            ProviderError::Connection {
                server: self.name.clone(),
                message: err.to_string(),
            }
        } else {
            ProviderError::Transport {
                server: self.name.clone(),
                message: err.to_string(),
            }
        }
    }

    /// Pick the response for `id` out of an SSE body, noting any
    /// notifications that arrived alongside it.
    fn select_event_response(&self, body: &str, id: &str) -> Result<Value, ProviderError> {
        for data in sse_data_events(body) {
            let message: Value =
                serde_json::from_str(&data).map_err(|source| ProviderError::InvalidJson {
                    server: self.name.clone(),
                    source,
                })?;
            if message.get("method").is_some() && message.get("id").is_none() {
                self.observe_notification(&message);
                continue;
            }
            if message.get("id").and_then(response_key).as_deref() == Some(id) {
                return Ok(message);
            }
        }
        Err(ProviderError::Protocol {
            server: self.name.clone(),
            message: format!("event stream ended without a response to request {id}"),
        })
    }

    fn observe_notification(&self, message: &Value) {
        if let Some(method) = message.get("method").and_then(Value::as_str) {
            debug!(server = %self.name, method, "Received notification from tool server");
            if method == TOOLS_LIST_CHANGED {
                self.catalog_changed.store(true, Ordering::SeqCst);
            }
        }
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn server(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        reqwest::Url::parse(&self.spec.url).map_err(|err| ProviderError::Connection {
            server: self.name.clone(),
            message: format!("invalid url '{}': {err}", self.spec.url),
        })?;
        Ok(())
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id();
        let response = self.post(&request_message(&id, method, params)).await?;

        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));
        let body = response
            .text()
            .await
            .map_err(|err| ProviderError::Transport {
                server: self.name.clone(),
                message: err.to_string(),
            })?;

        let envelope = if is_stream {
            self.select_event_response(&body, &id)?
        } else {
            serde_json::from_str(&body).map_err(|source| ProviderError::InvalidJson {
                server: self.name.clone(),
                source,
            })?
        };
        response_result(&self.name, envelope)
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ProviderError> {
        self.post(&notification_message(method, params)).await?;
        Ok(())
    }

    fn catalog_changed(&self) -> bool {
        self.catalog_changed.load(Ordering::SeqCst)
    }

    fn acknowledge_catalog(&self) {
        self.catalog_changed.store(false, Ordering::SeqCst);
    }

    async fn close(&self) {
        let Some(session) = self.session_id.lock().await.take() else {
            return;
        };
        let mut builder = self
            .http
            .delete(&self.spec.url)
            .header(SESSION_HEADER, session.as_str());
        for (key, value) in &self.spec.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Err(err) = builder.send().await {
            warn!(server = %self.name, %err, "Failed to release tool server session");
        }
    }
}

/// Collect the payload of every event in a `text/event-stream` body.
/// Multi-line `data:` fields are joined with newlines.
fn sse_data_events(body: &str) -> Vec<String> {
    let mut events = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in body.lines() {
        if line.is_empty() {
            if !current.is_empty() {
                events.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            current.push(data.strip_prefix(' ').unwrap_or(data));
        }
    }
    if !current.is_empty() {
        events.push(current.join("\n"));
    }
    events
}
