use super::signature::{CallSignature, ObjectShape, ParamType, TypeSpec};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Arguments that do not fit a tool's call signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid arguments: {}", format_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CallSignature {
    /// Check arguments against the signature. `null` counts as no arguments.
    pub fn validate(&self, arguments: &Value) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        match arguments {
            Value::Null => check_object(&self.params, &Map::new(), "$", &mut violations),
            Value::Object(map) => check_object(&self.params, map, "$", &mut violations),
            other => violations.push(Violation {
                path: "$".into(),
                message: format!("expected an object of arguments, got {}", kind_name(other)),
            }),
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

fn check_object(
    shape: &ObjectShape,
    map: &Map<String, Value>,
    path: &str,
    violations: &mut Vec<Violation>,
) {
    for field in &shape.fields {
        let field_path = format!("{path}.{}", field.name);
        match map.get(&field.name) {
            None if field.required => violations.push(Violation {
                path: field_path,
                message: "missing required field".into(),
            }),
            Some(Value::Null) if field.required && !field.spec.nullable => {
                violations.push(Violation {
                    path: field_path,
                    message: "required field is null".into(),
                })
            }
            // Optional fields may be absent or null.
            None | Some(Value::Null) => {}
            Some(value) => check_value(&field.spec, value, &field_path, violations),
        }
    }

    if !shape.open {
        for key in map.keys() {
            if shape.field(key).is_none() {
                violations.push(Violation {
                    path: format!("{path}.{key}"),
                    message: "unexpected field".into(),
                });
            }
        }
    }
}

fn check_value(spec: &TypeSpec, value: &Value, path: &str, violations: &mut Vec<Violation>) {
    if value.is_null() {
        if !spec.nullable {
            violations.push(Violation {
                path: path.to_string(),
                message: "value is null".into(),
            });
        }
        return;
    }

    let matches = match &spec.ty {
        ParamType::String => value.is_string(),
        ParamType::Number => value.is_number(),
        ParamType::Integer => is_integer(value),
        ParamType::Boolean => value.is_boolean(),
        ParamType::FreeForm => true,
        ParamType::Array(items) => match value.as_array() {
            Some(elements) => {
                for (index, element) in elements.iter().enumerate() {
                    check_value(items, element, &format!("{path}[{index}]"), violations);
                }
                true
            }
            None => false,
        },
        ParamType::Object(shape) => match value.as_object() {
            Some(map) => {
                check_object(shape, map, path, violations);
                true
            }
            None => false,
        },
    };

    if !matches {
        violations.push(Violation {
            path: path.to_string(),
            message: format!("expected {}, got {}", type_name(&spec.ty), kind_name(value)),
        });
        return;
    }

    if !spec.allowed.is_empty() && !spec.allowed.contains(value) {
        violations.push(Violation {
            path: path.to_string(),
            message: format!(
                "value {value} is not one of {}",
                Value::Array(spec.allowed.clone())
            ),
        });
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(number) => {
            number.is_i64()
                || number.is_u64()
                || number.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
        }
        _ => false,
    }
}

fn type_name(ty: &ParamType) -> &'static str {
    match ty {
        ParamType::String => "string",
        ParamType::Number => "number",
        ParamType::Integer => "integer",
        ParamType::Boolean => "boolean",
        ParamType::Array(_) => "array",
        ParamType::Object(_) => "object",
        ParamType::FreeForm => "any value",
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use crate::application::schema::translate_schema;
    use serde_json::json;

    fn add_signature() -> crate::application::schema::CallSignature {
        translate_schema(
            "add",
            &json!({
                "type": "object",
                "properties": {
                    "a": { "type": "number" },
                    "b": { "type": "number" },
                    "note": { "type": "string" }
                },
                "required": ["a", "b"]
            }),
        )
    }

    #[test]
    fn accepts_matching_arguments() {
        let signature = add_signature();
        assert!(signature.validate(&json!({"a": 2, "b": 3.5})).is_ok());
        assert!(signature.validate(&json!({"a": 2, "b": 3, "note": null})).is_ok());
    }

    #[test]
    fn reports_missing_required_fields() {
        let signature = add_signature();
        let err = signature.validate(&json!({"a": 2})).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].path, "$.b");
        assert!(err.to_string().contains("missing required field"));
    }

    #[test]
    fn reports_wrong_types_and_non_object_arguments() {
        let signature = add_signature();
        let err = signature.validate(&json!({"a": "two", "b": 3})).unwrap_err();
        assert_eq!(err.violations[0].message, "expected number, got string");

        let err = signature.validate(&json!([2, 3])).unwrap_err();
        assert_eq!(err.violations[0].path, "$");
    }

    #[test]
    fn null_arguments_mean_empty_object() {
        let signature = translate_schema("ping", &json!({"type": "object"}));
        assert!(signature.validate(&json!(null)).is_ok());
        assert!(add_signature().validate(&json!(null)).is_err());
    }

    #[test]
    fn closed_objects_reject_unknown_keys() {
        let signature = translate_schema(
            "strict",
            &json!({
                "type": "object",
                "properties": { "q": { "type": "string" } },
                "additionalProperties": false
            }),
        );
        let err = signature.validate(&json!({"q": "x", "extra": 1})).unwrap_err();
        assert_eq!(err.violations[0].path, "$.extra");
    }

    #[test]
    fn checks_enums_integers_and_nested_arrays() {
        let signature = translate_schema(
            "search",
            &json!({
                "type": "object",
                "properties": {
                    "mode": { "type": "string", "enum": ["fast", "deep"] },
                    "limit": { "type": "integer" },
                    "ids": { "type": "array", "items": { "type": "integer" } }
                }
            }),
        );
        assert!(signature.validate(&json!({"mode": "fast", "limit": 10.0})).is_ok());
        let err = signature
            .validate(&json!({"mode": "slow", "limit": 1.5, "ids": [1, "x"]}))
            .unwrap_err();
        let paths: Vec<_> = err.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["$.mode", "$.limit", "$.ids[1]"]);
    }
}
