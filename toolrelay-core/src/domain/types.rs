use super::tool::{ToolInvocation, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnContent {
    Text {
        text: String,
    },
    /// Assistant turn that emitted tool-call intents, with any text the model
    /// produced alongside them.
    ToolCalls {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        invocations: Vec<ToolInvocation>,
    },
    ToolResult {
        result: ToolResult,
    },
    /// Synthetic stand-in for a compacted prefix of the transcript.
    Summary {
        evicted: usize,
        topics: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: TurnContent) -> Self {
        Self {
            role,
            content,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, TurnContent::Text { text: text.into() })
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, TurnContent::Text { text: text.into() })
    }

    pub fn tool_calls(text: Option<String>, invocations: Vec<ToolInvocation>) -> Self {
        Self::new(Role::Assistant, TurnContent::ToolCalls { text, invocations })
    }

    pub fn tool_result(result: ToolResult) -> Self {
        Self::new(Role::Tool, TurnContent::ToolResult { result })
    }

    pub fn summary(evicted: usize, topics: Vec<String>) -> Self {
        Self::new(Role::System, TurnContent::Summary { evicted, topics })
    }

    /// Plain text of a text turn.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text { text } => Some(text),
            TurnContent::ToolCalls { text, .. } => text.as_deref(),
            _ => None,
        }
    }

    pub fn tool_result_ref(&self) -> Option<&ToolResult> {
        match &self.content {
            TurnContent::ToolResult { result } => Some(result),
            _ => None,
        }
    }

    pub fn invocations(&self) -> &[ToolInvocation] {
        match &self.content {
            TurnContent::ToolCalls { invocations, .. } => invocations,
            _ => &[],
        }
    }

    /// Text shown to the model in place of a compacted prefix.
    pub fn summary_text(&self) -> Option<String> {
        match &self.content {
            TurnContent::Summary { evicted, topics } if topics.is_empty() => {
                Some(format!("Earlier conversation ({evicted} turns) was compacted."))
            }
            TurnContent::Summary { evicted, topics } => Some(format!(
                "Earlier conversation ({evicted} turns) was compacted. Topics: {}.",
                topics.join(", ")
            )),
            _ => None,
        }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self.content, TurnContent::Summary { .. })
    }

    /// Everything in the turn a keyword scan should see.
    pub fn searchable_text(&self) -> String {
        match &self.content {
            TurnContent::Text { text } => text.clone(),
            TurnContent::ToolCalls { text, invocations } => {
                let mut out = text.clone().unwrap_or_default();
                for invocation in invocations {
                    out.push(' ');
                    out.push_str(&invocation.tool_name);
                    out.push(' ');
                    out.push_str(&invocation.arguments.to_string());
                }
                out
            }
            TurnContent::ToolResult { result } => result.payload.render(),
            TurnContent::Summary { topics, .. } => topics.join(" "),
        }
    }
}
