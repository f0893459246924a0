//! Check parsed tool arguments against the tool's parameter schema.

use crate::error::ToolError;

/// Validate arguments against a JSON Schema object.
///
/// Top-level only: object shape, required field presence, and primitive types
/// of declared properties. Allowed-value lists are left to the tool, which
/// reports its own error kind for them.
pub fn validate_arguments(
    args: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), ToolError> {
    if schema.get("type").and_then(|v| v.as_str()) == Some("object") && !args.is_object() {
        return Err(ToolError::InvalidArguments(format!(
            "expected object arguments, got {}",
            json_type_name(args)
        )));
    }

    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for name in required.iter().filter_map(|f| f.as_str()) {
            if obj.get(name).map_or(true, |v| v.is_null()) {
                return Err(ToolError::MissingRequiredParameter(name.to_string()));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
        for (key, value) in obj {
            let expected = properties
                .get(key)
                .and_then(|p| p.get("type"))
                .and_then(|t| t.as_str());
            if let Some(expected) = expected {
                if !value.is_null() && !value_matches_type(value, expected) {
                    return Err(ToolError::InvalidArguments(format!(
                        "field '{key}' expected type '{expected}', got {}",
                        json_type_name(value)
                    )));
                }
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
