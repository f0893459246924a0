//! Conversation messages.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tool_call::{ToolCall, ToolCallResult};

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Message role.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Image attached to a user message, carried base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageAttachment {
    pub data: String,
    pub mime_type: String,
}

impl ImageAttachment {
    /// Encode raw image bytes.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }
}

/// A single message of a conversation.
///
/// Content is mutable while the message streams; once `done` is set the
/// orchestrator no longer touches it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolCallResult>,
    pub done: bool,
    pub error: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(conversation_id: Uuid, role: Role, content: String, done: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content,
            image: None,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            done,
            error: false,
            created_at: Utc::now(),
        }
    }

    pub fn system(conversation_id: Uuid, text: impl Into<String>) -> Self {
        Self::new(conversation_id, Role::System, text.into(), true)
    }

    pub fn user(conversation_id: Uuid, text: impl Into<String>) -> Self {
        Self::new(conversation_id, Role::User, text.into(), true)
    }

    /// Empty assistant message that receives streamed content.
    pub fn assistant_placeholder(conversation_id: Uuid) -> Self {
        Self::new(conversation_id, Role::Assistant, String::new(), false)
    }

    pub fn with_image(mut self, image: Option<ImageAttachment>) -> Self {
        self.image = image;
        self
    }

    /// Attach tool calls. Ignored for anything but assistant messages.
    pub fn attach_tool_calls(&mut self, calls: Vec<ToolCall>) {
        if self.role == Role::Assistant {
            self.tool_calls = calls;
        }
    }

    /// Attach results, keeping only those that answer one of this message's calls.
    pub fn attach_tool_results(&mut self, results: Vec<ToolCallResult>) {
        self.tool_results = results
            .into_iter()
            .filter(|r| self.tool_calls.iter().any(|c| c.id == r.tool_call_id))
            .collect();
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Reasoning text inside a leading `<think>` block, if any.
    ///
    /// While the block is still open the whole remainder counts as thinking.
    pub fn thinking(&self) -> Option<String> {
        if !self.content.contains(THINK_OPEN) {
            return None;
        }
        let thought = match self.content.split_once(THINK_CLOSE) {
            Some((head, _)) => head,
            None => self.content.as_str(),
        };
        Some(thought.replace(THINK_OPEN, ""))
    }

    /// Content with the `<think>` block removed.
    ///
    /// Returns `None` while the model is still inside an unterminated block.
    pub fn visible_content(&self) -> Option<&str> {
        if !self.content.contains(THINK_OPEN) {
            return Some(&self.content);
        }
        self.content.split_once(THINK_CLOSE).map(|(_, rest)| rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant(content: &str) -> Message {
        let mut msg = Message::assistant_placeholder(Uuid::new_v4());
        msg.content = content.to_string();
        msg
    }

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!("tool".parse::<Role>().unwrap(), Role::Tool);
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    }

    #[test]
    fn placeholder_starts_empty_and_not_done() {
        let msg = Message::assistant_placeholder(Uuid::new_v4());
        assert!(msg.content.is_empty());
        assert!(!msg.done);
        assert!(!msg.error);
    }

    #[test]
    fn tool_calls_only_attach_to_assistant() {
        let mut user = Message::user(Uuid::new_v4(), "hi");
        user.attach_tool_calls(vec![ToolCall::new("c1", "get_timestamp", "{}")]);
        assert!(!user.has_tool_calls());

        let mut reply = assistant("");
        reply.attach_tool_calls(vec![ToolCall::new("c1", "get_timestamp", "{}")]);
        assert!(reply.has_tool_calls());
    }

    #[test]
    fn results_without_matching_call_are_dropped() {
        let mut reply = assistant("");
        reply.attach_tool_calls(vec![ToolCall::new("c1", "get_timestamp", "{}")]);
        reply.attach_tool_results(vec![
            ToolCallResult::success("c1", "1700000000"),
            ToolCallResult::failure("c9", "Unknown tool: x"),
        ]);
        assert_eq!(reply.tool_results.len(), 1);
        assert_eq!(reply.tool_results[0].tool_call_id, "c1");
    }

    #[test]
    fn think_block_is_split_from_visible_content() {
        let msg = assistant("<think>check the clock</think>It is noon.");
        assert_eq!(msg.thinking().as_deref(), Some("check the clock"));
        assert_eq!(msg.visible_content(), Some("It is noon."));
    }

    #[test]
    fn open_think_block_hides_content() {
        let msg = assistant("<think>still going");
        assert_eq!(msg.thinking().as_deref(), Some("still going"));
        assert_eq!(msg.visible_content(), None);
    }

    #[test]
    fn plain_content_has_no_thinking() {
        let msg = assistant("Hello");
        assert_eq!(msg.thinking(), None);
        assert_eq!(msg.visible_content(), Some("Hello"));
    }

    #[test]
    fn image_bytes_are_base64_encoded() {
        let image = ImageAttachment::from_bytes(b"png!", "image/png");
        assert_eq!(image.data, "cG5nIQ==");
    }
}
