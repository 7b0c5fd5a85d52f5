use super::error::ConfigError;
use crate::constants::{DEFAULT_CALL_TIMEOUT_MS, DEFAULT_HANDSHAKE_TIMEOUT_MS};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

/// A tool server entry from `[[servers]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub transport: ServerTransport,
    /// Startup fails when a mandatory server cannot be registered.
    pub mandatory: bool,
    pub handshake_timeout: Duration,
    pub call_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerTransport {
    Stdio(StdioServer),
    Http(HttpServer),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioServer {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServer {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

impl ServerConfig {
    /// An HTTP server with default timeouts.
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: ServerTransport::Http(HttpServer {
                url: url.into(),
                headers: BTreeMap::new(),
            }),
            mandatory: false,
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
            call_timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn transport_name(&self) -> &'static str {
        match self.transport {
            ServerTransport::Stdio(_) => "stdio",
            ServerTransport::Http(_) => "http",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawServer {
    name: String,
    #[serde(default)]
    transport: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    workdir: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    mandatory: bool,
    #[serde(default)]
    handshake_timeout_ms: Option<u64>,
    #[serde(default)]
    call_timeout_ms: Option<u64>,
}

fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

impl TryFrom<RawServer> for ServerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawServer) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| ConfigError::InvalidServer {
            server: raw.name.clone(),
            reason: reason.to_string(),
        };

        let kind = match raw.transport.as_deref() {
            Some(kind) => kind.to_ascii_lowercase(),
            None if raw.url.is_some() && raw.command.is_none() => "http".to_string(),
            None => "stdio".to_string(),
        };

        let transport = match kind.as_str() {
            "stdio" => {
                let command = raw
                    .command
                    .as_deref()
                    .map(str::trim)
                    .filter(|command| !command.is_empty())
                    .ok_or_else(|| invalid("stdio transport requires 'command'"))?;
                ServerTransport::Stdio(StdioServer {
                    command: PathBuf::from(expand(command)),
                    args: raw.args.iter().map(|arg| expand(arg)).collect(),
                    env: raw
                        .env
                        .iter()
                        .map(|(key, value)| (key.clone(), expand(value)))
                        .collect(),
                    workdir: raw.workdir.as_deref().map(|dir| PathBuf::from(expand(dir))),
                })
            }
            "http" => {
                let url = raw
                    .url
                    .as_deref()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| invalid("http transport requires 'url'"))?;
                ServerTransport::Http(HttpServer {
                    url: expand(url),
                    headers: raw
                        .headers
                        .iter()
                        .map(|(key, value)| (key.clone(), expand(value)))
                        .collect(),
                })
            }
            other => {
                return Err(invalid(&format!(
                    "unknown transport '{other}', expected 'stdio' or 'http'"
                )));
            }
        };

        let timeout = |value: Option<u64>, default: u64, key: &str| match value {
            Some(0) => Err(invalid(&format!("'{key}' must be greater than zero"))),
            Some(ms) => Ok(Duration::from_millis(ms)),
            None => Ok(Duration::from_millis(default)),
        };
        let handshake_timeout = timeout(
            raw.handshake_timeout_ms,
            DEFAULT_HANDSHAKE_TIMEOUT_MS,
            "handshake_timeout_ms",
        )?;
        let call_timeout = timeout(raw.call_timeout_ms, DEFAULT_CALL_TIMEOUT_MS, "call_timeout_ms")?;

        Ok(Self {
            name: raw.name.clone(),
            transport,
            mandatory: raw.mandatory,
            handshake_timeout,
            call_timeout,
        })
    }
}
