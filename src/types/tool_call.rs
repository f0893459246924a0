//! Tool-call wire types.

use serde::{Deserialize, Deserializer, Serialize};

/// A model's request to invoke a tool.
///
/// Wire shape: `{"id": "...", "type": "function", "function": {"name": "...", "arguments": "<json>"}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

/// Target function and its still-unvalidated arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object. Object payloads are re-encoded on read.
    #[serde(default, deserialize_with = "arguments_as_string")]
    pub arguments: String,
}

fn default_call_type() -> String {
    "function".to_string()
}

fn arguments_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(raw) => raw,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Build a call with a fresh `call_<uuid>` identifier.
    pub fn with_generated_id(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::new(generate_call_id(), name, arguments)
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn arguments(&self) -> &str {
        &self.function.arguments
    }
}

pub fn generate_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Outcome of one tool call: a result XOR an error, never both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawToolCallResult", into = "RawToolCallResult")]
pub struct ToolCallResult {
    pub tool_call_id: String,
    outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Success(String),
    Failure(String),
}

impl ToolCallResult {
    pub fn success(tool_call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: Outcome::Success(result.into()),
        }
    }

    pub fn failure(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: Outcome::Failure(error.into()),
        }
    }

    pub fn result(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success(text) => Some(text),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(message) => Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Failure(_))
    }

    /// Text handed back to the model for the next round.
    pub fn content_for_model(&self) -> String {
        match &self.outcome {
            Outcome::Success(text) => text.clone(),
            Outcome::Failure(message) => format!("Error: {message}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawToolCallResult {
    tool_call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TryFrom<RawToolCallResult> for ToolCallResult {
    type Error = String;

    fn try_from(raw: RawToolCallResult) -> Result<Self, Self::Error> {
        let outcome = match (raw.result, raw.error) {
            (Some(result), None) => Outcome::Success(result),
            (None, Some(error)) => Outcome::Failure(error),
            (Some(_), Some(_)) => {
                return Err(format!(
                    "tool result {} has both result and error",
                    raw.tool_call_id
                ))
            }
            (None, None) => {
                return Err(format!(
                    "tool result {} has neither result nor error",
                    raw.tool_call_id
                ))
            }
        };
        Ok(Self {
            tool_call_id: raw.tool_call_id,
            outcome,
        })
    }
}

impl From<ToolCallResult> for RawToolCallResult {
    fn from(value: ToolCallResult) -> Self {
        let (result, error) = match value.outcome {
            Outcome::Success(text) => (Some(text), None),
            Outcome::Failure(message) => (None, Some(message)),
        };
        Self {
            tool_call_id: value.tool_call_id,
            result,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arguments_accept_encoded_string() {
        let call: ToolCall = serde_json::from_value(json!({
            "id": "c1",
            "type": "function",
            "function": {"name": "get_current_time", "arguments": "{\"timezone\":\"UTC\"}"}
        }))
        .unwrap();
        assert_eq!(call.arguments(), r#"{"timezone":"UTC"}"#);
    }

    #[test]
    fn arguments_accept_inline_object() {
        let call: ToolCall = serde_json::from_value(json!({
            "id": "c1",
            "function": {"name": "get_current_time", "arguments": {"timezone": "UTC"}}
        }))
        .unwrap();
        assert_eq!(call.call_type, "function");
        assert_eq!(call.arguments(), r#"{"timezone":"UTC"}"#);
    }

    #[test]
    fn missing_arguments_become_empty() {
        let call: ToolCall = serde_json::from_value(json!({
            "id": "c1",
            "type": "function",
            "function": {"name": "get_timestamp"}
        }))
        .unwrap();
        assert_eq!(call.arguments(), "");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = ToolCall::with_generated_id("get_timestamp", "{}");
        let b = ToolCall::with_generated_id("get_timestamp", "{}");
        assert!(a.id.starts_with("call_"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn result_is_success_xor_error() {
        let ok = ToolCallResult::success("c1", "12:00:00 (UTC)");
        assert_eq!(ok.result(), Some("12:00:00 (UTC)"));
        assert_eq!(ok.error(), None);

        let err = ToolCallResult::failure("c2", "Unknown tool: x");
        assert!(err.is_error());
        assert_eq!(err.result(), None);
        assert_eq!(err.content_for_model(), "Error: Unknown tool: x");
    }

    #[test]
    fn result_with_both_fields_is_rejected() {
        let parsed = serde_json::from_value::<ToolCallResult>(json!({
            "toolCallId": "c1", "result": "a", "error": "b"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn result_serializes_only_populated_field() {
        let value = serde_json::to_value(ToolCallResult::failure("c1", "boom")).unwrap();
        assert_eq!(value, json!({"toolCallId": "c1", "error": "boom"}));
    }
}
