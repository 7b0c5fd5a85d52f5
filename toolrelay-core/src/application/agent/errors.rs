use crate::application::schema::ValidationError;
use crate::domain::ToolResult;
use crate::infrastructure::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] ModelError),
    #[error("turn cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn user_message(&self) -> String {
        match self {
            AgentError::ModelUnavailable(err) => err.user_message(),
            AgentError::Cancelled => "Cancelled. Nothing from this turn was kept.".to_string(),
        }
    }
}

/// Problems the dispatch loop reports to the model as error results.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool requested: {0}")]
    NotFound(String),
    #[error("invalid arguments for tool '{tool}': {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: ValidationError,
    },
}

impl ToolError {
    pub fn user_message(&self) -> String {
        match self {
            ToolError::NotFound(name) => {
                format!("Tool \"{name}\" is not available. Use one of the listed tools.")
            }
            ToolError::InvalidArguments { tool, source } => {
                let details = source
                    .violations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                format!("Tool \"{tool}\" was called with invalid arguments: {details}")
            }
        }
    }

    pub fn into_result(self, invocation_id: impl Into<String>) -> ToolResult {
        ToolResult::error(invocation_id, self.user_message())
    }
}
