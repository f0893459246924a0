//! Recognize tool calls embedded in assistant text.
//!
//! Models that lack native function calling answer with a JSON payload
//! instead, either fenced (```` ```json {...} ``` ````) or inline. The
//! [`ToolCallExtractor`] runs an ordered list of [`Strategy`] matchers and
//! stops at the first one that yields well-formed calls. Only the matched
//! span is removed from the text; fragments that fail to parse stay in place
//! as prose.

mod scan;

use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::types::{generate_call_id, FunctionCall, ToolCall};

/// Result of running the extractor over one completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub has_tool_calls: bool,
    pub tool_calls: Vec<ToolCall>,
    /// Text with the matched tool-call markup removed and trimmed. Identical
    /// to the input when nothing matched.
    pub content: String,
}

/// One way of encoding tool calls in text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    /// A ```` ```json ```` block holding `{"tool_calls": [...]}`, a bare array
    /// of calls, or one call.
    FencedBlock,
    /// An unfenced `{"tool_calls": [...]}` object.
    BareBatch,
    /// An unfenced single call, `{"id": "...", "type": "function", ...}`.
    BareCall,
}

/// A strategy's successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub strategy: Strategy,
    /// Byte range of the markup to strip.
    pub span: Range<usize>,
    pub calls: Vec<ToolCall>,
}

impl Strategy {
    /// Find the first well-formed candidate for this encoding.
    pub fn find(self, text: &str) -> Option<Match> {
        match self {
            Self::FencedBlock => find_fenced(text),
            Self::BareBatch => find_bare(text, self, bare_batch_prefix(), parse_batch),
            Self::BareCall => find_bare(text, self, bare_call_prefix(), parse_single),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolCallExtractor {
    strategies: Vec<Strategy>,
}

impl Default for ToolCallExtractor {
    fn default() -> Self {
        Self::new(vec![Strategy::FencedBlock, Strategy::BareBatch, Strategy::BareCall])
    }
}

impl ToolCallExtractor {
    pub fn new(strategies: Vec<Strategy>) -> Self {
        Self { strategies }
    }

    pub fn extract(&self, text: &str) -> ParsedResponse {
        let found = self.strategies.iter().find_map(|s| s.find(text));
        let Some(found) = found else {
            return ParsedResponse {
                has_tool_calls: false,
                tool_calls: Vec::new(),
                content: text.to_string(),
            };
        };

        debug!(
            strategy = %found.strategy,
            calls = found.calls.len(),
            "extracted tool calls from text"
        );
        let mut content = String::with_capacity(text.len());
        content.push_str(&text[..found.span.start]);
        content.push_str(&text[found.span.end..]);

        ParsedResponse {
            has_tool_calls: true,
            tool_calls: found.calls,
            content: content.trim().to_string(),
        }
    }
}

/// Run the default strategy list.
pub fn extract_tool_calls(text: &str) -> ParsedResponse {
    ToolCallExtractor::default().extract(text)
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?i:json)[ \t]*\r?\n?([\s\S]*?)```").expect("valid regex"))
}

fn bare_batch_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\{\s*"tool_calls"\s*:\s*\["#).expect("valid regex"))
}

fn bare_call_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\{\s*"id"\s*:\s*"[^"]+"\s*,\s*"type"\s*:\s*"function""#).expect("valid regex")
    })
}

fn find_fenced(text: &str) -> Option<Match> {
    fenced_block().captures_iter(text).find_map(|caps| {
        let block = caps.get(0)?;
        let body = caps.get(1)?.as_str().trim();
        let calls = parse_batch(body)
            .or_else(|| parse_array(body))
            .or_else(|| parse_single(body))?;
        Some(Match {
            strategy: Strategy::FencedBlock,
            span: block.range(),
            calls,
        })
    })
}

fn find_bare(
    text: &str,
    strategy: Strategy,
    prefix: &Regex,
    parse: fn(&str) -> Option<Vec<ToolCall>>,
) -> Option<Match> {
    // Objects nested in a rejected candidate are never tried on their own.
    scan::top_level_objects(text).into_iter().find_map(|span| {
        let candidate = &text[span.clone()];
        if !prefix.is_match(candidate) {
            return None;
        }
        let calls = parse(candidate)?;
        Some(Match {
            strategy,
            span,
            calls,
        })
    })
}

#[derive(Deserialize)]
struct RawBatch {
    tool_calls: Vec<RawCall>,
}

#[derive(Deserialize)]
struct RawCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    call_type: Option<String>,
    function: FunctionCall,
}

fn parse_batch(body: &str) -> Option<Vec<ToolCall>> {
    let batch: RawBatch = serde_json::from_str(body).ok()?;
    normalize(batch.tool_calls)
}

fn parse_array(body: &str) -> Option<Vec<ToolCall>> {
    let calls: Vec<RawCall> = serde_json::from_str(body).ok()?;
    normalize(calls)
}

fn parse_single(body: &str) -> Option<Vec<ToolCall>> {
    let call: RawCall = serde_json::from_str(body).ok()?;
    normalize(vec![call])
}

/// Validate raw calls, fill in missing ids and drop repeated ids.
///
/// Returns `None` unless every entry is well-formed and at least one remains.
fn normalize(raw: Vec<RawCall>) -> Option<Vec<ToolCall>> {
    let mut seen = HashSet::new();
    let mut calls = Vec::with_capacity(raw.len());
    for call in raw {
        if call.function.name.trim().is_empty() {
            return None;
        }
        if call.call_type.as_deref().is_some_and(|t| t != "function") {
            return None;
        }
        let id = call
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_call_id);
        if seen.insert(id.clone()) {
            calls.push(ToolCall::new(id, call.function.name, call.function.arguments));
        }
    }
    (!calls.is_empty()).then_some(calls)
}
