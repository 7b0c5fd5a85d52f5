use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("tool server '{server}' has no open session")]
    NotInitialized { server: String },
    #[error("failed to spawn tool server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot connect to tool server '{server}': {message}")]
    Connection { server: String, message: String },
    #[error("tool server '{server}' timed out during {operation} after {}ms", .after.as_millis())]
    Timeout {
        server: String,
        operation: String,
        after: Duration,
    },
    #[error("tool server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("tool server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("tool server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("tool server '{server}' violated the protocol: {message}")]
    Protocol { server: String, message: String },
    #[error("tool server '{server}' expired the session")]
    SessionExpired { server: String },
    #[error("tool server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("tool server '{server}' request cancelled")]
    Cancelled { server: String },
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. })
    }

    /// Whether the session behind this error can no longer be trusted and the
    /// handshake must be repeated before the next request.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            ProviderError::Terminated { .. }
                | ProviderError::SessionExpired { .. }
                | ProviderError::NotInitialized { .. }
                | ProviderError::Cancelled { .. }
                | ProviderError::Spawn { .. }
                | ProviderError::Connection { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to register provider '{provider}': {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },
}
