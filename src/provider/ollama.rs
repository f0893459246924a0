//! Ollama backend over the native `/api/chat` NDJSON protocol.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{json_headers, ndjson_stream, shared_client, status_to_error};
use super::{ChatBackend, ChatMessage, ChatRequest, ChatStream};
use crate::config::ParleyConfig;
use crate::error::ParleyError;
use crate::models::LanguageModel;
use crate::tools::ToolDefinition;
use crate::types::{generate_call_id, ChatChunk, ChatOptions, Role, ToolCall};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for one Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    base_url: String,
    bearer_token: Option<String>,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            bearer_token: None,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &ParleyConfig) -> Self {
        Self::new(&config.base_url)
            .with_bearer_token(config.bearer_token.clone())
            .with_request_timeout(config.request_timeout)
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Bound on connecting and receiving response headers. The streamed body
    /// itself is not bounded.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn check_root(&self) -> Result<(), ParleyError> {
        let resp = with_timeout(self.request_timeout, async {
            Ok(shared_client()
                .get(&self.base_url)
                .headers(json_headers(self.bearer_token.as_deref()))
                .send()
                .await?)
        })
        .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ParleyError::api(resp.status().as_u16(), "reachability check failed"))
        }
    }

    async fn fetch_tags(&self) -> Result<Vec<LanguageModel>, ParleyError> {
        let resp = with_timeout(self.request_timeout, async {
            Ok(shared_client()
                .get(self.url("/api/tags"))
                .headers(json_headers(self.bearer_token.as_deref()))
                .send()
                .await?)
        })
        .await?;
        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body));
        }
        let tags: TagsResponse = resp.json().await?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| LanguageModel::from_families(m.name, &m.details.families.unwrap_or_default()))
            .collect())
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Add a scheme when missing and drop trailing slashes.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_BASE_URL.to_string();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn reachable(&self) -> bool {
        match self.retry.execute(|| self.check_root()).await {
            Ok(()) => true,
            Err(e) => {
                debug!(base_url = %self.base_url, error = %e, "ollama unreachable");
                false
            }
        }
    }

    async fn open(&self, request: ChatRequest) -> Result<ChatStream, ParleyError> {
        let body = OllamaChatRequest::from(&request);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "ollama chat"
        );

        let resp = with_timeout(self.request_timeout, async {
            Ok(shared_client()
                .post(self.url("/api/chat"))
                .headers(json_headers(self.bearer_token.as_deref()))
                .json(&body)
                .send()
                .await?)
        })
        .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body));
        }

        let records = ndjson_stream::<OllamaChatResponse>(resp);
        Ok(Box::pin(records.map(|record| record.and_then(ChatChunk::try_from))))
    }

    async fn list_models(&self) -> Result<Vec<LanguageModel>, ParleyError> {
        self.retry.execute(|| self.fetch_tags()).await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: &'a ChatOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

impl<'a> From<&'a ChatRequest> for OllamaChatRequest<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        Self {
            model: &request.model,
            messages: request.messages.iter().map(OllamaMessage::from).collect(),
            stream: true,
            options: &request.options,
            tools: request.tools.as_deref(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl From<&ChatMessage> for OllamaMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            images: message.images.clone(),
            tool_calls: message.tool_calls.iter().map(OllamaToolCall::from).collect(),
            tool_name: message.tool_name.clone(),
        }
    }
}

/// Ollama carries arguments as a JSON object and usually omits ids.
#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: OllamaFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

impl From<&ToolCall> for OllamaToolCall {
    fn from(call: &ToolCall) -> Self {
        let arguments = serde_json::from_str(call.arguments())
            .unwrap_or_else(|_| serde_json::json!({}));
        Self {
            id: Some(call.id.clone()),
            function: OllamaFunction {
                name: call.name().to_string(),
                arguments,
            },
        }
    }
}

impl From<OllamaToolCall> for ToolCall {
    fn from(call: OllamaToolCall) -> Self {
        let arguments = match call.function.arguments {
            serde_json::Value::String(raw) => raw,
            serde_json::Value::Null => "{}".to_string(),
            other => other.to_string(),
        };
        let id = call.id.filter(|id| !id.is_empty()).unwrap_or_else(generate_call_id);
        ToolCall::new(id, call.function.name, arguments)
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl TryFrom<OllamaChatResponse> for ChatChunk {
    type Error = ParleyError;

    fn try_from(resp: OllamaChatResponse) -> Result<Self, Self::Error> {
        if let Some(error) = resp.error {
            return Err(ParleyError::Stream(error));
        }
        let (content, tool_calls) = match resp.message {
            Some(message) => (
                Some(message.content).filter(|c| !c.is_empty()),
                message.tool_calls.into_iter().map(ToolCall::from).collect(),
            ),
            None => (None, Vec::new()),
        };
        Ok(ChatChunk {
            content,
            tool_calls,
            done: resp.done,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    details: TagDetails,
}

#[derive(Debug, Default, Deserialize)]
struct TagDetails {
    #[serde(default)]
    families: Option<Vec<String>>,
}
