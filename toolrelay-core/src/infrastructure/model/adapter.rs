//! Message adapters - convert the transcript into provider wire formats
//!
//! Tool result payloads are passed through as rendered by
//! [`ToolPayload::render`](crate::domain::ToolPayload::render) so the model
//! sees exactly what the provider returned. Error results are prefixed with
//! `ERROR: `.

use super::types::ToolSpec;
use crate::domain::{ToolCallIntent, ToolResult, Turn, TurnContent};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Adapter for converting messages to different API formats
pub struct MessageAdapter;

impl MessageAdapter {
    /// OpenAI chat completions messages with native `tool_calls`.
    pub fn to_openai_format(system: &str, turns: &[Turn]) -> Vec<Value> {
        let mut messages = Self::system_message(system);
        for turn in turns {
            let message = match &turn.content {
                TurnContent::Text { text } => json!({"role": turn.role.as_str(), "content": text}),
                TurnContent::Summary { .. } => Self::summary_message(turn),
                TurnContent::ToolCalls { text, invocations } => json!({
                    "role": "assistant",
                    "content": text,
                    "tool_calls": invocations
                        .iter()
                        .map(|invocation| json!({
                            "id": invocation.invocation_id,
                            "type": "function",
                            "function": {
                                "name": invocation.tool_name,
                                "arguments": invocation.arguments.to_string(),
                            }
                        }))
                        .collect::<Vec<_>>(),
                }),
                TurnContent::ToolResult { result } => json!({
                    "role": "tool",
                    "tool_call_id": result.invocation_id,
                    "content": Self::result_text(result),
                }),
            };
            messages.push(message);
        }
        messages
    }

    /// Ollama `/api/chat` messages. Tool calls carry argument objects and tool
    /// results name the tool they answer.
    pub fn to_ollama_format(system: &str, turns: &[Turn]) -> Vec<Value> {
        let mut messages = Self::system_message(system);
        let mut names: HashMap<&str, &str> = HashMap::new();
        for turn in turns {
            let message = match &turn.content {
                TurnContent::Text { text } => json!({"role": turn.role.as_str(), "content": text}),
                TurnContent::Summary { .. } => Self::summary_message(turn),
                TurnContent::ToolCalls { text, invocations } => {
                    for invocation in invocations {
                        names.insert(&invocation.invocation_id, &invocation.tool_name);
                    }
                    json!({
                        "role": "assistant",
                        "content": text.clone().unwrap_or_default(),
                        "tool_calls": invocations
                            .iter()
                            .map(|invocation| json!({
                                "function": {
                                    "name": invocation.tool_name,
                                    "arguments": invocation.arguments,
                                }
                            }))
                            .collect::<Vec<_>>(),
                    })
                }
                TurnContent::ToolResult { result } => {
                    let mut message = json!({
                        "role": "tool",
                        "content": Self::result_text(result),
                    });
                    if let Some(name) = names.get(result.invocation_id.as_str()) {
                        message["tool_name"] = Value::String((*name).to_string());
                    }
                    message
                }
            };
            messages.push(message);
        }
        messages
    }

    /// Plain role/content messages for the JSON action protocol. Tool calls
    /// are replayed as the action the model emitted and tool results arrive
    /// as user messages wrapping a `tool_result` object.
    pub fn to_directive_format(system: &str, turns: &[Turn]) -> Vec<Value> {
        let mut messages = Self::system_message(system);
        let mut names: HashMap<&str, &str> = HashMap::new();
        for turn in turns {
            let message = match &turn.content {
                TurnContent::Text { text } => json!({"role": turn.role.as_str(), "content": text}),
                TurnContent::Summary { .. } => Self::summary_message(turn),
                TurnContent::ToolCalls { invocations, .. } => {
                    for invocation in invocations {
                        names.insert(&invocation.invocation_id, &invocation.tool_name);
                    }
                    let calls: Vec<Value> = invocations
                        .iter()
                        .map(|invocation| json!({
                            "id": invocation.invocation_id,
                            "tool": invocation.tool_name,
                            "input": invocation.arguments,
                        }))
                        .collect();
                    json!({
                        "role": "assistant",
                        "content": json!({"action": "call_tools", "calls": calls}).to_string(),
                    })
                }
                TurnContent::ToolResult { result } => {
                    let tool = names
                        .get(result.invocation_id.as_str())
                        .copied()
                        .unwrap_or_default();
                    json!({
                        "role": "user",
                        "content": json!({
                            "tool_result": {
                                "id": result.invocation_id,
                                "tool": tool,
                                "success": !result.is_error,
                                "output": result.payload.render(),
                            }
                        })
                        .to_string(),
                    })
                }
            };
            messages.push(message);
        }
        messages
    }

    /// Function definitions in the shape both OpenAI and Ollama accept.
    pub fn to_function_specs(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description.clone().unwrap_or_default(),
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect()
    }

    /// Tool calls from an OpenAI response, whose arguments are JSON text.
    /// Unparseable argument text is kept as a string so validation reports it.
    pub fn parse_openai_tool_calls(calls: &[Value]) -> Vec<ToolCallIntent> {
        calls
            .iter()
            .filter_map(|call| {
                let function = call.get("function")?;
                let name = function.get("name")?.as_str()?;
                let arguments = match function.get("arguments") {
                    Some(Value::String(raw)) if raw.trim().is_empty() => Value::Null,
                    Some(Value::String(raw)) => {
                        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
                    }
                    Some(other) => other.clone(),
                    None => Value::Null,
                };
                let intent = ToolCallIntent::new(name, arguments);
                Some(match call.get("id").and_then(Value::as_str) {
                    Some(id) if !id.is_empty() => intent.with_id(id),
                    _ => intent,
                })
            })
            .collect()
    }

    fn system_message(system: &str) -> Vec<Value> {
        if system.trim().is_empty() {
            Vec::new()
        } else {
            vec![json!({"role": "system", "content": system})]
        }
    }

    fn summary_message(turn: &Turn) -> Value {
        json!({"role": "system", "content": turn.summary_text().unwrap_or_default()})
    }

    fn result_text(result: &ToolResult) -> String {
        let text = result.payload.render();
        if result.is_error {
            format!("ERROR: {text}")
        } else {
            text
        }
    }
}
