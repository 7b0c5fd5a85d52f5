use super::MAX_SCHEMA_DEPTH;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub description: Option<String>,
    pub nullable: bool,
    /// Values from an `enum` list, empty when unconstrained.
    pub allowed: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    String,
    Number,
    Integer,
    Boolean,
    Array(Box<SchemaNode>),
    Object {
        properties: Vec<(String, SchemaNode)>,
        required: BTreeSet<String>,
        additional: bool,
    },
    /// Anything the parser could not classify.
    Opaque,
}

/// A place where the parser had to fall back to a permissive type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradation {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSchema {
    pub node: SchemaNode,
    pub degradations: Vec<Degradation>,
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            description: None,
            nullable: false,
            allowed: Vec::new(),
        }
    }

    pub fn opaque() -> Self {
        Self::new(SchemaKind::Opaque)
    }

    pub fn empty_object() -> Self {
        Self::new(SchemaKind::Object {
            properties: Vec::new(),
            required: BTreeSet::new(),
            additional: true,
        })
    }

    /// Parse a JSON-Schema-like value. Never fails.
    pub fn parse(value: &Value) -> ParsedSchema {
        let mut degradations = Vec::new();
        let node = parse_node(value, "", 0, &mut degradations);
        ParsedSchema { node, degradations }
    }
}

fn degrade(degradations: &mut Vec<Degradation>, path: &str, reason: impl Into<String>) {
    degradations.push(Degradation {
        path: if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        },
        reason: reason.into(),
    });
}

fn parse_node(
    value: &Value,
    path: &str,
    depth: usize,
    degradations: &mut Vec<Degradation>,
) -> SchemaNode {
    if depth > MAX_SCHEMA_DEPTH {
        degrade(degradations, path, "nesting exceeds depth limit");
        return SchemaNode::opaque();
    }

    let Some(map) = value.as_object() else {
        // `true` is the JSON Schema spelling of "anything goes".
        if value != &Value::Bool(true) {
            degrade(degradations, path, "schema node is not an object");
        }
        return SchemaNode::opaque();
    };

    let description = map
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    let allowed = map
        .get("enum")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let (tag, nullable) = match type_tag(map) {
        Ok(found) => found,
        Err(reason) => {
            degrade(degradations, path, reason);
            let mut node = SchemaNode::opaque();
            node.description = description;
            return node;
        }
    };

    let kind = match tag.as_deref() {
        Some("string") => SchemaKind::String,
        Some("number") => SchemaKind::Number,
        Some("integer") => SchemaKind::Integer,
        Some("boolean") => SchemaKind::Boolean,
        Some("array") => {
            let items_path = format!("{path}/items");
            let items = match map.get("items") {
                Some(items) => parse_node(items, &items_path, depth + 1, degradations),
                None => {
                    degrade(degradations, &items_path, "array without items");
                    SchemaNode::opaque()
                }
            };
            SchemaKind::Array(Box::new(items))
        }
        Some("object") => parse_object(map, path, depth, degradations),
        // No tag at all: an object if it declares properties, otherwise opaque.
        None if map.contains_key("properties") => parse_object(map, path, depth, degradations),
        None => {
            if !map.is_empty() && !only_annotations(map) {
                degrade(degradations, path, "missing type tag");
            }
            SchemaKind::Opaque
        }
        Some(other) => {
            degrade(degradations, path, format!("unsupported type tag '{other}'"));
            SchemaKind::Opaque
        }
    };

    SchemaNode {
        kind,
        description,
        nullable,
        allowed,
    }
}

/// Read the `type` keyword. A `["x", "null"]` pair means nullable `x`.
fn type_tag(map: &Map<String, Value>) -> Result<(Option<String>, bool), String> {
    match map.get("type") {
        None => Ok((None, false)),
        Some(Value::String(tag)) if tag == "null" => {
            Err("type 'null' carries no parameter shape".into())
        }
        Some(Value::String(tag)) => Ok((Some(tag.clone()), false)),
        Some(Value::Array(tags)) => {
            let names: Vec<&str> = tags.iter().filter_map(Value::as_str).collect();
            let nullable = names.contains(&"null");
            let concrete: Vec<&str> = names.into_iter().filter(|tag| *tag != "null").collect();
            match concrete.as_slice() {
                [single] => Ok((Some(single.to_string()), nullable)),
                [] => Err("type list has no concrete type".into()),
                _ => Err("type unions are not supported".into()),
            }
        }
        Some(_) => Err("type tag is not a string".into()),
    }
}

fn only_annotations(map: &Map<String, Value>) -> bool {
    map.keys()
        .all(|key| matches!(key.as_str(), "description" | "title" | "default" | "examples"))
}

fn parse_object(
    map: &Map<String, Value>,
    path: &str,
    depth: usize,
    degradations: &mut Vec<Degradation>,
) -> SchemaKind {
    let mut properties = Vec::new();
    match map.get("properties") {
        Some(Value::Object(entries)) => {
            for (name, child) in entries {
                let child_path = format!("{path}/properties/{name}");
                properties.push((
                    name.clone(),
                    parse_node(child, &child_path, depth + 1, degradations),
                ));
            }
        }
        Some(_) => degrade(
            degradations,
            &format!("{path}/properties"),
            "properties is not an object",
        ),
        None => {}
    }

    let mut required = BTreeSet::new();
    match map.get("required") {
        Some(Value::Array(names)) => {
            for name in names {
                match name.as_str() {
                    Some(name) if properties.iter().any(|(key, _)| key == name) => {
                        required.insert(name.to_string());
                    }
                    Some(name) => degrade(
                        degradations,
                        &format!("{path}/required"),
                        format!("required field '{name}' is not a declared property"),
                    ),
                    None => degrade(
                        degradations,
                        &format!("{path}/required"),
                        "required entry is not a string",
                    ),
                }
            }
        }
        Some(_) => degrade(
            degradations,
            &format!("{path}/required"),
            "required is not an array",
        ),
        None => {}
    }

    let additional = !matches!(map.get("additionalProperties"), Some(Value::Bool(false)));

    SchemaKind::Object {
        properties,
        required,
        additional,
    }
}
