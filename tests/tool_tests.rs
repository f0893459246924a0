//! Built-in tools through the registry and executor, and the text extractor.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use parley::config::ParleyConfig;
use parley::extract::{extract_tool_calls, Strategy, ToolCallExtractor};
use parley::tools::{ToolArguments, ToolCommand, ToolExecutor, ToolParameters, ToolRegistry};
use parley::types::ToolCall;

fn executor() -> ToolExecutor {
    let config = ParleyConfig {
        web_tools_enabled: false,
        ..ParleyConfig::default()
    };
    ToolExecutor::new(Arc::new(ToolRegistry::builtin(&config)))
}

#[test]
fn builtin_registry_lists_datetime_tools() {
    let config = ParleyConfig {
        web_tools_enabled: false,
        ..ParleyConfig::default()
    };
    let registry = ToolRegistry::builtin(&config);
    assert_eq!(
        registry.names(),
        vec![
            "get_current_time",
            "get_current_date",
            "get_timestamp",
            "format_date",
            "get_timezone"
        ]
    );
    let definitions = registry.list();
    assert!(definitions.iter().all(|d| d.kind == "function"));
}

#[test]
fn parameter_builder_marks_required_fields() {
    let params = ToolParameters::object()
        .string("query", "Search query", true)
        .string("region", "Result region", false)
        .string_enum("unit", "Unit", &["seconds", "milliseconds"], false)
        .build();
    assert_eq!(params.schema["properties"]["region"]["type"], "string");
    assert_eq!(params.required(), vec!["query"]);
}

#[test]
fn arguments_accessors() {
    let args = ToolArguments::new(json!({"name": "Ada", "note": " "}));
    assert_eq!(args.get_str("name").unwrap(), "Ada");
    assert_eq!(args.get_str_opt("note"), None);
    assert_eq!(args.get_str_opt("missing"), None);
    assert!(args.get_str("missing").is_err());
}

#[tokio::test]
async fn format_date_converts_timestamps() {
    let result = executor()
        .execute(&ToolCall::new(
            "c1",
            "format_date",
            json!({
                "input": "1700000000",
                "inputFormat": "timestamp",
                "outputFormat": "yyyy-MM-dd HH:mm",
                "timezone": "UTC"
            })
            .to_string(),
        ))
        .await;
    assert_eq!(result.result(), Some("2023-11-14 22:13"));
}

#[tokio::test]
async fn unknown_timezone_is_an_error_result() {
    let result = executor()
        .execute(&ToolCall::new(
            "c1",
            "get_current_time",
            r#"{"timezone":"Mars/Olympus"}"#,
        ))
        .await;
    assert_eq!(result.error(), Some("Invalid timezone: Mars/Olympus"));
    assert_eq!(result.content_for_model(), "Error: Invalid timezone: Mars/Olympus");
}

#[tokio::test]
async fn timestamp_rejects_unknown_units() {
    let result = executor()
        .execute(&ToolCall::new("c1", "get_timestamp", r#"{"unit":"fortnights"}"#))
        .await;
    assert!(result.is_error());
}

#[tokio::test]
async fn time_command_runs_without_a_model() {
    let command = ToolCommand::parse("/time").unwrap();
    let result = executor().execute(&command.to_tool_call()).await;
    assert!(result.result().is_some_and(|r| r.ends_with("(UTC)")));
}

#[test]
fn bare_batch_in_prose_is_extracted() {
    let text = r#"Checking both. {"tool_calls":[{"id":"a","type":"function","function":{"name":"get_current_date","arguments":"{}"}},{"id":"b","type":"function","function":{"name":"get_timezone","arguments":"{}"}}]} Done."#;
    let parsed = extract_tool_calls(text);
    let names: Vec<_> = parsed.tool_calls.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["get_current_date", "get_timezone"]);
    assert_eq!(parsed.content, "Checking both.  Done.");
}

#[test]
fn fenced_block_wins_over_bare_call() {
    let text = concat!(
        r#"{"id":"bare","type":"function","function":{"name":"get_timestamp","arguments":"{}"}}"#,
        "\n```json\n",
        r#"{"id":"fenced","type":"function","function":{"name":"get_timezone","arguments":"{}"}}"#,
        "\n```"
    );
    let parsed = extract_tool_calls(text);
    assert_eq!(parsed.tool_calls.len(), 1);
    assert_eq!(parsed.tool_calls[0].id, "fenced");
}

#[test]
fn restricted_extractor_ignores_other_encodings() {
    let text = r#"{"id":"bare","type":"function","function":{"name":"get_timestamp","arguments":"{}"}}"#;
    let fenced_only = ToolCallExtractor::new(vec![Strategy::FencedBlock]);
    assert!(!fenced_only.extract(text).has_tool_calls);
    assert!(extract_tool_calls(text).has_tool_calls);
}
