//! In-process tools available without any server.

use chrono::Utc;
use serde_json::{Value, json};
use toolrelay_core::domain::{ToolDescriptor, ToolPayload};
use toolrelay_core::tooling::LocalProvider;

pub const BUILTIN_PROVIDER: &str = "builtin";

pub fn provider() -> LocalProvider {
    LocalProvider::new(BUILTIN_PROVIDER)
        .with_sync_tool(
            ToolDescriptor::new("add", "Add two numbers", binary_schema()),
            |args| binary(&args, |a, b| a + b),
        )
        .with_sync_tool(
            ToolDescriptor::new("multiply", "Multiply two numbers", binary_schema()),
            |args| binary(&args, |a, b| a * b),
        )
        .with_sync_tool(
            ToolDescriptor::new(
                "current_time",
                "Current date and time in UTC, RFC 3339",
                json!({"type": "object", "properties": {}}),
            ),
            |_| Ok(ToolPayload::Text(Utc::now().to_rfc3339())),
        )
}

fn binary_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": {"type": "number"},
            "b": {"type": "number"}
        },
        "required": ["a", "b"]
    })
}

fn binary(args: &Value, op: impl Fn(f64, f64) -> f64) -> Result<ToolPayload, String> {
    let operand = |key: &str| {
        args.get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| format!("'{key}' must be a number"))
    };
    Ok(ToolPayload::Text(format_number(op(operand("a")?, operand("b")?))))
}

/// Whole numbers print without a fractional part.
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolrelay_core::domain::ToolInvocation;
    use toolrelay_core::tooling::ToolProvider;

    fn invoke(tool: &str, arguments: Value) -> ToolInvocation {
        ToolInvocation {
            invocation_id: "call-1".into(),
            tool_name: tool.into(),
            arguments,
        }
    }

    #[tokio::test]
    async fn add_renders_whole_numbers() {
        let result = provider().call_tool(invoke("add", json!({"a": 2, "b": 3}))).await;
        assert!(!result.is_error);
        assert_eq!(result.payload.render(), "5");
    }

    #[tokio::test]
    async fn multiply_keeps_fractions() {
        let result = provider()
            .call_tool(invoke("multiply", json!({"a": 1.5, "b": 3})))
            .await;
        assert_eq!(result.payload.render(), "4.5");
    }

    #[tokio::test]
    async fn lists_three_tools() {
        let names: Vec<_> = provider()
            .list_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(names, vec!["add", "multiply", "current_time"]);
    }
}
