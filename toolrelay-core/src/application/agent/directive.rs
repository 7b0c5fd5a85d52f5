//! JSON action protocol used when tools are described in the prompt instead
//! of being offered natively.

use crate::domain::ToolCallIntent;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum AgentDirective {
    Final { response: String },
    CallTools { calls: Vec<ToolCallIntent> },
}

/// Read a directive out of model text.
///
/// JSON is looked for as the whole text, inside a fenced code block, or as
/// the outermost `{...}` span. Text without any JSON object is a final
/// answer. A JSON object that claims an action but is malformed is an error
/// so the model can be asked to correct it.
pub fn parse_directive(content: &str) -> Result<AgentDirective, String> {
    match extract_json(content) {
        Some(Value::Object(map)) => match map.get("action").and_then(Value::as_str) {
            Some(action) => parse_action(action, &map),
            None if map.contains_key("tool") => parse_action("call_tool", &map),
            None => Ok(AgentDirective::Final {
                response: content.trim().to_string(),
            }),
        },
        Some(Value::String(inner)) if inner.trim_start().starts_with('{') => parse_directive(&inner),
        _ => Ok(AgentDirective::Final {
            response: content.trim().to_string(),
        }),
    }
}

fn parse_action(action: &str, map: &serde_json::Map<String, Value>) -> Result<AgentDirective, String> {
    match action {
        "call_tool" => Ok(AgentDirective::CallTools {
            calls: vec![parse_call(map)?],
        }),
        "call_tools" => {
            let calls = map
                .get("calls")
                .and_then(Value::as_array)
                .ok_or("call_tools action missing calls array")?;
            if calls.is_empty() {
                return Err("call_tools action has an empty calls array".into());
            }
            let calls = calls
                .iter()
                .map(|call| match call {
                    Value::Object(call) => parse_call(call),
                    _ => Err("each entry of calls must be an object".to_string()),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AgentDirective::CallTools { calls })
        }
        "final" => {
            let response = map
                .get("response")
                .and_then(Value::as_str)
                .ok_or("final action missing response field")?;
            if response.trim().is_empty() {
                return Err("final action has an empty response".into());
            }
            Ok(AgentDirective::Final {
                response: response.to_string(),
            })
        }
        other => Err(format!("unknown action value: {other}")),
    }
}

fn parse_call(map: &serde_json::Map<String, Value>) -> Result<ToolCallIntent, String> {
    let tool = map
        .get("tool")
        .and_then(Value::as_str)
        .filter(|tool| !tool.trim().is_empty())
        .ok_or("call_tool action missing tool field")?;
    let input = map
        .get("input")
        .or_else(|| map.get("arguments"))
        .cloned()
        .unwrap_or(Value::Null);
    let intent = ToolCallIntent::new(tool, input);
    Ok(match map.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => intent.with_id(id),
        _ => intent,
    })
}

fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(start) = trimmed.find("```") {
        let fenced = &trimmed[start + 3..];
        let fenced = fenced
            .strip_prefix("json")
            .or_else(|| fenced.strip_prefix("JSON"))
            .unwrap_or(fenced);
        if let Some(end) = fenced.find("```") {
            if let Ok(value) = serde_json::from_str::<Value>(fenced[..end].trim()) {
                return Some(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return Some(value);
            }
        }
    }

    None
}
