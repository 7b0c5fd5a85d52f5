//! # Dispatch Loop
//!
//! The [`Agent`] turns one user prompt into a final answer. It asks the model
//! for either an answer or tool-call intents, runs the intents against the
//! [`ToolRegistry`](crate::application::tooling::ToolRegistry), feeds the
//! results back and asks again.
//!
//! ```text
//! AwaitingModel --no intents--> FinalAnswer
//!      ^   |
//!      |   +--intents--> HandlingToolCalls --results appended--+
//!      +-------------------------------------------------------+
//! ```
//!
//! Turns produced while a prompt is being handled are staged and only handed
//! back when the run completes, so a failed or cancelled run leaves the
//! caller's transcript untouched.
//!
//! An [`AgentTool`] wraps an agent and its own registry as one tool, so an
//! outer agent can hand a sub-task to an inner one.

mod delegate;
mod directive;
mod errors;
mod instructions;
mod models;
mod runner;


pub use delegate::AgentTool;
pub use directive::{AgentDirective, parse_directive};
pub use errors::{AgentError, ToolError};
pub use instructions::compose_system_instructions;
pub use models::{AgentOptions, AgentOutcome, AgentStep, DispatchState};
pub use runner::Agent;
