//! Bridge between a language model and external tools.
//!
//! A [`Conversation`] owns the transcript of one session and runs each user
//! prompt through the [`Agent`] dispatch loop, which exposes the tools of a
//! [`ToolRegistry`] to the model and feeds their results back until the model
//! answers.

pub mod application;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use application::agent::{Agent, AgentError, AgentOptions, AgentOutcome, AgentTool};
pub use application::conversation::{Conversation, ConversationStatus};
pub use application::tooling::{LocalProvider, ServerManager, ToolProvider, ToolRegistry};
pub use application::transcript::{Transcript, TranscriptPolicy};
pub use application::{agent, schema, tooling};
pub use config::{AppConfig, ConfigError};
pub use infrastructure::model;
pub use infrastructure::model::DynamicModelProvider;
