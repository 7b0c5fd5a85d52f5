use super::node::{SchemaKind, SchemaNode};
use serde_json::{Map, Value, json};

/// Validated parameter shape of one tool. Built once at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSignature {
    pub params: ObjectShape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectShape {
    pub fields: Vec<FieldSignature>,
    /// Whether keys outside `fields` are accepted.
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSignature {
    pub name: String,
    pub required: bool,
    pub spec: TypeSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub ty: ParamType,
    pub nullable: bool,
    pub allowed: Vec<Value>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array(Box<TypeSpec>),
    Object(ObjectShape),
    /// Accepts any value; advertised to the model as a string.
    FreeForm,
}

impl ObjectShape {
    pub fn open_empty() -> Self {
        Self {
            fields: Vec::new(),
            open: true,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSignature> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Derive a call signature from a parsed schema node.
///
/// The root of a tool schema is always an object; any other root becomes an
/// open, empty parameter object.
pub fn translate(node: &SchemaNode) -> CallSignature {
    let params = match &node.kind {
        SchemaKind::Object {
            properties,
            required,
            additional,
        } => translate_object(properties, required, *additional),
        _ => ObjectShape::open_empty(),
    };
    CallSignature { params }
}

fn translate_object(
    properties: &[(String, SchemaNode)],
    required: &std::collections::BTreeSet<String>,
    additional: bool,
) -> ObjectShape {
    ObjectShape {
        fields: properties
            .iter()
            .map(|(name, child)| FieldSignature {
                name: name.clone(),
                required: required.contains(name),
                spec: translate_spec(child),
            })
            .collect(),
        open: additional,
    }
}

fn translate_spec(node: &SchemaNode) -> TypeSpec {
    let ty = match &node.kind {
        SchemaKind::String => ParamType::String,
        SchemaKind::Number => ParamType::Number,
        SchemaKind::Integer => ParamType::Integer,
        SchemaKind::Boolean => ParamType::Boolean,
        SchemaKind::Array(items) => ParamType::Array(Box::new(translate_spec(items))),
        SchemaKind::Object {
            properties,
            required,
            additional,
        } => ParamType::Object(translate_object(properties, required, *additional)),
        SchemaKind::Opaque => ParamType::FreeForm,
    };
    TypeSpec {
        ty,
        nullable: node.nullable,
        allowed: node.allowed.clone(),
        description: node.description.clone(),
    }
}

impl CallSignature {
    /// A signature that takes no declared parameters and accepts any object.
    pub fn permissive() -> Self {
        Self {
            params: ObjectShape::open_empty(),
        }
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.params
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name.as_str())
    }

    /// Render back to JSON Schema for the model's tool list.
    pub fn to_json_schema(&self) -> Value {
        render_object(&self.params)
    }
}

fn render_object(shape: &ObjectShape) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in &shape.fields {
        properties.insert(field.name.clone(), render_spec(&field.spec));
        if field.required {
            required.push(Value::String(field.name.clone()));
        }
    }
    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if let Some(map) = schema.as_object_mut() {
        if !required.is_empty() {
            map.insert("required".into(), Value::Array(required));
        }
        if !shape.open {
            map.insert("additionalProperties".into(), Value::Bool(false));
        }
    }
    schema
}

fn render_spec(spec: &TypeSpec) -> Value {
    let mut schema = match &spec.ty {
        ParamType::String | ParamType::FreeForm => json!({ "type": "string" }),
        ParamType::Number => json!({ "type": "number" }),
        ParamType::Integer => json!({ "type": "integer" }),
        ParamType::Boolean => json!({ "type": "boolean" }),
        ParamType::Array(items) => json!({ "type": "array", "items": render_spec(items) }),
        ParamType::Object(shape) => render_object(shape),
    };
    if let Some(map) = schema.as_object_mut() {
        if spec.nullable {
            if let Some(tag) = map.get("type").cloned() {
                map.insert("type".into(), json!([tag, "null"]));
            }
        }
        if !spec.allowed.is_empty() {
            map.insert("enum".into(), Value::Array(spec.allowed.clone()));
        }
        if let Some(description) = &spec.description {
            map.insert("description".into(), Value::String(description.clone()));
        }
    }
    schema
}
