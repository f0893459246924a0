//! Typed access to tool call arguments.

use crate::error::ToolError;

/// Wrapper around a parsed argument object providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Parse a JSON-encoded argument payload.
    ///
    /// Empty or whitespace-only payloads are an empty object. Anything that is
    /// not a JSON object is rejected.
    pub fn parse(raw: &str) -> Result<Self, ToolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(serde_json::json!({})));
        }
        let value: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if !value.is_object() {
            return Err(ToolError::InvalidArguments(
                "arguments must be a JSON object".to_string(),
            ));
        }
        Ok(Self::new(value))
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a required string argument.
    pub fn get_str(&self, key: &str) -> Result<&str, ToolError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::MissingRequiredParameter(key.to_string()))
    }

    /// Get an optional string argument. Blank strings count as absent.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_empty_object() {
        let args = ToolArguments::parse("   ").unwrap();
        assert_eq!(args.raw(), &serde_json::json!({}));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(
            ToolArguments::parse("[1, 2]"),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            ToolArguments::parse("{not json"),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn missing_string_names_the_parameter() {
        let args = ToolArguments::parse(r#"{"input": "2024-01-01"}"#).unwrap();
        assert_eq!(args.get_str("input").unwrap(), "2024-01-01");
        assert_eq!(
            args.get_str("outputFormat"),
            Err(ToolError::MissingRequiredParameter("outputFormat".into()))
        );
    }

    #[test]
    fn blank_optional_string_is_absent() {
        let args = ToolArguments::parse(r#"{"timezone": "  ", "format": "HH:mm"}"#).unwrap();
        assert_eq!(args.get_str_opt("timezone"), None);
        assert_eq!(args.get_str_opt("format"), Some("HH:mm"));
    }
}
