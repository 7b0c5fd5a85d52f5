pub mod tool;
pub mod types;

pub use tool::{ContentChunk, ToolCallIntent, ToolDescriptor, ToolInvocation, ToolPayload, ToolResult};
pub use types::{Role, Turn, TurnContent};
