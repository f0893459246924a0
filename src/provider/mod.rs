//! Chat backend trait and implementations.

pub mod http;
pub mod ollama;

pub use ollama::OllamaBackend;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::ParleyError;
use crate::models::LanguageModel;
use crate::tools::ToolDefinition;
use crate::types::{ChatChunk, ChatOptions, Role, ToolCall};

/// Stream of decoded reply chunks.
pub type ChatStream = BoxStream<'static, Result<ChatChunk, ParleyError>>;

/// A message as sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Base64-encoded images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Tool that produced this message, for `tool` role messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
            tool_calls: Vec::new(),
            tool_name: None,
            tool_call_id: None,
        }
    }

    pub fn tool_result(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }
}

/// One streaming exchange request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Tool definitions, present only when tool calling is on for this exchange.
    pub tools: Option<Vec<ToolDefinition>>,
    pub options: ChatOptions,
}

/// A remote text-generation service.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend name for logs (e.g. "ollama").
    fn name(&self) -> &str;

    /// Whether the service answers at all. Never errors.
    async fn reachable(&self) -> bool;

    /// Open a streaming exchange.
    async fn open(&self, request: ChatRequest) -> Result<ChatStream, ParleyError>;

    /// Models the service can run.
    async fn list_models(&self) -> Result<Vec<LanguageModel>, ParleyError>;
}
