use super::{
    TOOLS_LIST_CHANGED, Transport, notification_message, request_message, response_key,
    response_result,
};
use crate::application::tooling::error::ProviderError;
use crate::config::StdioServer;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, warn};

type Responder = oneshot::Sender<Result<Value, ProviderError>>;

/// Newline-delimited JSON-RPC over a child process's stdin/stdout.
///
/// Stdout carries protocol messages only. Lines that are not JSON (ANSI log
/// output is common) are skipped. Stderr is the diagnostic channel and is
/// forwarded to the `debug` log.
#[derive(Clone)]
pub struct StdioTransport {
    inner: Arc<StdioInner>,
}

struct StdioInner {
    name: String,
    spec: StdioServer,
    state: AsyncMutex<Option<RunningState>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: Mutex<HashMap<String, Responder>>,
    id_counter: AtomicU64,
    generation: AtomicU64,
    catalog_changed: AtomicBool,
}

struct RunningState {
    child: Child,
    generation: u64,
}

/// Drops the pending entry when a request is abandoned, e.g. by a timeout.
struct PendingGuard<'a> {
    inner: &'a StdioInner,
    id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner.pending_map().remove(&self.id);
    }
}

impl StdioTransport {
    pub fn new(name: impl Into<String>, spec: StdioServer) -> Self {
        Self {
            inner: Arc::new(StdioInner {
                name: name.into(),
                spec,
                state: AsyncMutex::new(None),
                writer: AsyncMutex::new(None),
                pending: Mutex::new(HashMap::new()),
                id_counter: AtomicU64::new(1),
                generation: AtomicU64::new(0),
                catalog_changed: AtomicBool::new(false),
            }),
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn server(&self) -> &str {
        &self.inner.name
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        self.inner.ensure_running().await
    }

    async fn is_alive(&self) -> bool {
        self.inner.state.lock().await.is_some()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        if !self.is_alive().await {
            let server = self.inner.name.clone();
            return Err(if self.inner.generation.load(Ordering::SeqCst) == 0 {
                ProviderError::NotInitialized { server }
            } else {
                ProviderError::Terminated { server }
            });
        }
        self.inner.send_request(method, params).await
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ProviderError> {
        self.inner
            .write_message(&notification_message(method, params))
            .await
    }

    fn catalog_changed(&self) -> bool {
        self.inner.catalog_changed.load(Ordering::SeqCst)
    }

    fn acknowledge_catalog(&self) {
        self.inner.catalog_changed.store(false, Ordering::SeqCst);
    }

    async fn close(&self) {
        self.inner.reset(None).await;
    }
}

impl StdioInner {
    async fn ensure_running(self: &Arc<Self>) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Ok(());
        }

        let mut command = Command::new(&self.spec.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.spec.workdir {
            command.current_dir(dir);
        }
        if !self.spec.args.is_empty() {
            command.args(&self.spec.args);
        }
        for (key, value) in &self.spec.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| ProviderError::Spawn {
            server: self.name.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.transport_error("failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.transport_error("failed to capture server stdout"))?;
        let stderr = child.stderr.take();

        *self.writer.lock().await = Some(BufWriter::new(stdin));

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *state = Some(RunningState { child, generation });
        drop(state);

        debug!(server = %self.name, command = %self.spec.command.display(), "Spawned tool server");

        let reader_self = Arc::clone(self);
        tokio::spawn(async move {
            reader_self.reader_loop(stdout, generation).await;
        });
        if let Some(stderr) = stderr {
            let name = self.name.clone();
            tokio::spawn(forward_stderr(name, stderr));
        }
        Ok(())
    }

    async fn reader_loop(self: Arc<Self>, stdout: ChildStdout, generation: u64) {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(raw)) = lines.next_line().await {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !trimmed.starts_with('{') {
                debug!(
                    server = %self.name,
                    line = trimmed,
                    "Skipping non-JSON line on tool server stdout"
                );
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => {
                    if let Err(err) = self.process_inbound_message(value).await {
                        warn!(server = %self.name, %err, "Failed to process message from tool server");
                    }
                }
                Err(source) => {
                    warn!(
                        server = %self.name,
                        line = trimmed,
                        %source,
                        "Received invalid JSON from tool server"
                    );
                }
            }
        }

        debug!(server = %self.name, "Tool server stdout closed");
        self.reset(Some(generation)).await;
    }

    async fn process_inbound_message(&self, value: Value) -> Result<(), ProviderError> {
        match (value.get("id").cloned(), value.get("method").is_some()) {
            (Some(id), true) => self.handle_server_request(id, value).await,
            (Some(id), false) => {
                self.handle_response(id, value);
                Ok(())
            }
            (None, true) => {
                self.handle_notification(&value);
                Ok(())
            }
            (None, false) => Ok(()),
        }
    }

    fn handle_response(&self, id: Value, value: Value) {
        let Some(key) = response_key(&id) else {
            return;
        };
        let responder = self.pending_map().remove(&key);
        match responder {
            Some(sender) => {
                let _ = sender.send(response_result(&self.name, value));
            }
            None => debug!(
                server = %self.name,
                response_id = key,
                "Received response for unknown or abandoned request"
            ),
        }
    }

    async fn handle_server_request(&self, id: Value, value: Value) -> Result<(), ProviderError> {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let reply = match method {
            "ping" => json!({"jsonrpc": "2.0", "id": id, "result": {}}),
            other => {
                warn!(server = %self.name, method = other, "Tool server sent unsupported request");
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": -32601,
                        "message": format!("client does not implement method '{other}'"),
                    }
                })
            }
        };
        self.write_message(&reply).await
    }

    fn handle_notification(&self, value: &Value) {
        if let Some(method) = value.get("method").and_then(Value::as_str) {
            debug!(server = %self.name, method, "Received notification from tool server");
            if method == TOOLS_LIST_CHANGED {
                self.catalog_changed.store(true, Ordering::SeqCst);
            }
        }
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending_map().insert(id.clone(), tx);
        let _guard = PendingGuard {
            inner: self,
            id: id.clone(),
        };

        self.write_message(&request_message(&id, method, params))
            .await?;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Cancelled {
                server: self.name.clone(),
            }),
        }
    }

    async fn write_message(&self, message: &Value) -> Result<(), ProviderError> {
        let mut encoded =
            serde_json::to_string(message).map_err(|source| ProviderError::InvalidJson {
                server: self.name.clone(),
                source,
            })?;
        encoded.push('\n');

        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or_else(|| ProviderError::Terminated {
            server: self.name.clone(),
        })?;
        stream
            .write_all(encoded.as_bytes())
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        Ok(())
    }

    /// Tear down the running child. With `Some(generation)` only that child is
    /// affected, so a late reader exit cannot kill its replacement.
    async fn reset(&self, generation: Option<u64>) {
        let mut state = self.state.lock().await;
        let matches = match (state.as_ref(), generation) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(running), Some(expected)) => running.generation == expected,
        };
        if matches {
            *self.writer.lock().await = None;
            if let Some(mut running) = state.take() {
                if let Err(err) = running.child.kill().await {
                    debug!(
                        server = %self.name,
                        %err,
                        "Failed to kill tool server process (may have already exited)"
                    );
                }
                let _ = running.child.wait().await;
            }
        }
        drop(state);

        if matches {
            self.fail_all_pending();
        }
    }

    fn fail_all_pending(&self) {
        let drained: Vec<Responder> = self.pending_map().drain().map(|(_, tx)| tx).collect();
        for sender in drained {
            let _ = sender.send(Err(ProviderError::Terminated {
                server: self.name.clone(),
            }));
        }
    }

    fn pending_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, Responder>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }

    fn transport_error(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::Transport {
            server: self.name.clone(),
            message: message.into(),
        }
    }
}

async fn forward_stderr(server: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end();
        if !line.is_empty() {
            debug!(server = %server, line, "Tool server stderr");
        }
    }
}
