use crate::config::{AppConfig, ToolCallMode};
use crate::constants::DEFAULT_MAX_TOOL_ROUNDS;
use crate::domain::{ToolCallIntent, Turn};
use serde_json::Value;

/// Where the dispatch loop is within one run.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchState {
    AwaitingModel,
    HandlingToolCalls {
        text: Option<String>,
        intents: Vec<ToolCallIntent>,
    },
    FinalAnswer {
        response: String,
        degraded: bool,
    },
}

#[derive(Debug, Clone)]
pub struct AgentStep {
    pub invocation_id: String,
    pub tool: String,
    pub input: Value,
    pub success: bool,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub response: String,
    /// Set when the answer was synthesized by the loop instead of the model.
    pub degraded: bool,
    pub rounds: usize,
    pub steps: Vec<AgentStep>,
    /// Every turn the run produced, starting with the user turn.
    pub turns: Vec<Turn>,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub provider: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub max_tool_rounds: usize,
    pub tool_call_mode: ToolCallMode,
    pub concurrent_tools: bool,
    /// Names of the registry tools this agent may see and call. `None` means all.
    pub tools: Option<Vec<String>>,
}

impl AgentOptions {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            system_prompt: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            tool_call_mode: ToolCallMode::default(),
            concurrent_tools: true,
            tools: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            provider: config.default_provider.clone(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tool_rounds: config.agent.max_tool_rounds,
            tool_call_mode: config.agent.tool_call_mode,
            concurrent_tools: config.agent.concurrent_tools,
            tools: config.agent.tools.clone(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_mode(mut self, mode: ToolCallMode) -> Self {
        self.tool_call_mode = mode;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn sequential(mut self) -> Self {
        self.concurrent_tools = false;
        self
    }
}
