//! # Tooling
//!
//! Tool providers and the registry that indexes them.
//!
//! - [`LocalProvider`] wraps in-process functions.
//! - [`RemoteProvider`] speaks the MCP tool protocol over a [`Transport`]
//!   ([`StdioTransport`] for a child process, [`HttpTransport`] for an HTTP
//!   endpoint) and owns the handshake.
//! - [`ToolRegistry`] translates every listed tool's schema once and resolves
//!   tool names at dispatch time.
//! - [`ServerManager`] builds remote providers from configuration.

mod error;
mod interface;
mod local;
mod manager;
mod registry;
mod remote;
pub mod transport;

pub use error::{ProviderError, RegistryError};
pub use interface::{HandshakeInfo, ToolProvider};
pub use local::{LocalProvider, ToolHandler};
pub use manager::ServerManager;
pub use registry::{CollisionPolicy, RegisteredTool, ToolRegistry};
pub use remote::{RemoteProvider, RemoteTimeouts};
pub use transport::{HttpTransport, StdioTransport, Transport};
