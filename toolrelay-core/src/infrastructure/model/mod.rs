//! Model infrastructure module
//!
//! Language model backends behind one routing provider.
//!
//! # Structure
//! - `types` - Request, Response, Error types
//! - `traits` - ModelProvider, ModelClient traits
//! - `adapter` - Transcript to wire-format conversion
//! - `factory` - Provider factory for creating clients
//! - `clients` - OpenAI-compatible and Ollama clients
//! - `provider` - DynamicModelProvider for routing

pub mod adapter;
pub mod clients;
pub mod factory;
pub mod provider;
pub mod traits;
pub mod types;

pub use provider::DynamicModelProvider;
pub use traits::{ModelClient, ModelProvider};
pub use types::{ModelError, ModelRequest, ModelResponse, ToolSpec};
