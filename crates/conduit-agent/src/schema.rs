//! Argument validation against a tool's input schema.
//!
//! Supports the JSON Schema keywords tool providers actually publish:
//! `type`, `required`, `properties`, `additionalProperties: false`, `enum`,
//! `items`, `minLength`/`maxLength` and `minimum`/`maximum`. Anything else
//! is ignored, so an unfamiliar schema never rejects a call on its own.

use serde_json::{Map, Value};

/// First violation found, with the path to the offending value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct SchemaError {
    /// Location such as `$.query` or `$.files[2]`.
    pub path: String,
    pub message: String,
}

impl SchemaError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Validate `value` against `schema`.
pub fn validate(schema: &Value, value: &Value) -> Result<(), SchemaError> {
    check(schema, value, "$")
}

fn check(schema: &Value, value: &Value, path: &str) -> Result<(), SchemaError> {
    let Some(schema) = schema.as_object() else {
        return Ok(());
    };

    check_type(schema, value, path)?;

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array)
        && !allowed.contains(value)
    {
        return Err(SchemaError::new(
            path,
            format!("value {} is not one of {}", value, Value::Array(allowed.clone())),
        ));
    }

    match value {
        Value::Object(object) => check_object(schema, object, path),
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (index, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{}[{}]", path, index))?;
                }
            }
            Ok(())
        }
        Value::String(s) => {
            let len = s.chars().count() as u64;
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64)
                && len < min
            {
                return Err(SchemaError::new(
                    path,
                    format!("string shorter than {} characters", min),
                ));
            }
            if let Some(max) = schema.get("maxLength").and_then(Value::as_u64)
                && len > max
            {
                return Err(SchemaError::new(
                    path,
                    format!("string longer than {} characters", max),
                ));
            }
            Ok(())
        }
        Value::Number(n) => {
            let Some(n) = n.as_f64() else {
                return Ok(());
            };
            if let Some(min) = schema.get("minimum").and_then(Value::as_f64)
                && n < min
            {
                return Err(SchemaError::new(path, format!("{} is less than {}", n, min)));
            }
            if let Some(max) = schema.get("maximum").and_then(Value::as_f64)
                && n > max
            {
                return Err(SchemaError::new(path, format!("{} is greater than {}", n, max)));
            }
            Ok(())
        }
        Value::Bool(_) | Value::Null => Ok(()),
    }
}

fn check_type(schema: &Map<String, Value>, value: &Value, path: &str) -> Result<(), SchemaError> {
    let allowed: Vec<&str> = match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => return Ok(()),
    };
    if allowed.is_empty() || allowed.iter().any(|t| type_matches(t, value)) {
        return Ok(());
    }
    Err(SchemaError::new(
        path,
        format!("expected {}, got {}", allowed.join(" or "), type_name(value)),
    ))
}

fn check_object(
    schema: &Map<String, Value>,
    object: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaError> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(name) {
                return Err(SchemaError::new(
                    path,
                    format!("missing required property '{}'", name),
                ));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, field) in object {
        let field_path = format!("{}.{}", path, key);
        match properties.and_then(|p| p.get(key)) {
            Some(field_schema) => check(field_schema, field, &field_path)?,
            None if closed => {
                return Err(SchemaError::new(&field_path, "unexpected property"));
            }
            None => {}
        }
    }
    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => match value {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
            _ => false,
        },
        // Unknown type names do not constrain.
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
