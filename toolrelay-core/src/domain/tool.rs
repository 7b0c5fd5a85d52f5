use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A callable operation as described by its provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-Schema-like parameter description, exactly as the provider sent it.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        let description = description.into();
        Self {
            name: name.into(),
            description: if description.trim().is_empty() {
                None
            } else {
                Some(description)
            },
            input_schema,
        }
    }
}

/// Structured request from the model to call a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallIntent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallIntent {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub invocation_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentChunk {
    Text {
        text: String,
    },
    Binary {
        mime_type: String,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ToolPayload {
    Text(String),
    Structured(Value),
    Content(Vec<ContentChunk>),
}

impl ToolPayload {
    /// Text form handed to the model. Text chunks pass through unchanged.
    pub fn render(&self) -> String {
        match self {
            ToolPayload::Text(text) => text.clone(),
            ToolPayload::Structured(value) => match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            },
            ToolPayload::Content(chunks) => chunks
                .iter()
                .map(|chunk| match chunk {
                    ContentChunk::Text { text } => text.clone(),
                    ContentChunk::Binary { mime_type, data } => {
                        format!("[binary content: {mime_type}, {} bytes]", data.len())
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub invocation_id: String,
    pub payload: ToolPayload,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(invocation_id: impl Into<String>, payload: ToolPayload) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            payload,
            is_error: false,
        }
    }

    pub fn error(invocation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            payload: ToolPayload::Text(message.into()),
            is_error: true,
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
