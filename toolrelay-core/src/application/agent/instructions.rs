use crate::application::tooling::RegisteredTool;
use crate::config::ToolCallMode;

const DEFAULT_PREAMBLE: &str =
    "You are a helpful assistant. Use the available tools when they help answer the request.";

/// Build the system prompt for one run.
///
/// In native mode tools travel as function definitions, so the prompt only
/// carries the preamble and server guidance. In directive mode the prompt
/// also explains the JSON action protocol and lists every tool with its
/// parameter schema.
pub fn compose_system_instructions(
    preamble: Option<&str>,
    mode: ToolCallMode,
    tools: &[RegisteredTool],
    guidance: &[(String, String)],
) -> String {
    let mut lines = vec![
        preamble
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(DEFAULT_PREAMBLE)
            .to_string(),
    ];

    if mode == ToolCallMode::Directive {
        lines.extend(
            [
                "Every response must be a single JSON object without commentary.",
                "To invoke one tool respond with: {\"action\":\"call_tool\",\"tool\":\"tool_name\",\"input\":{...}}.",
                "To invoke several independent tools at once respond with: {\"action\":\"call_tools\",\"calls\":[{\"tool\":\"tool_name\",\"input\":{...}}]}.",
                "Tool results come back as a JSON object with a \"tool_result\" field.",
                "When you are ready to answer the user respond with: {\"action\":\"final\",\"response\":\"...\"}.",
            ]
            .map(String::from),
        );
    }

    for (server, instruction) in guidance {
        lines.push(format!("Server '{server}' guidance: {instruction}"));
    }

    if mode == ToolCallMode::Directive {
        if tools.is_empty() {
            lines.push("No tools are currently available.".to_string());
        } else {
            lines.push("Available tools:".to_string());
            for tool in tools {
                let mut line = format!("- {}", tool.name());
                if let Some(description) = &tool.descriptor.description {
                    line.push_str(&format!(": {description}"));
                }
                let schema = tool.signature.to_json_schema();
                line.push_str(&format!(". Input schema: {schema}"));
                lines.push(line);
            }
        }
    }

    lines.join("\n")
}
