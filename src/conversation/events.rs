//! Observer-facing events.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ConversationState, Message, ToolCall, ToolCallResult};

/// Callback receiving every [`ConversationEvent`]. Runs on the orchestrator
/// task, so it must not block.
pub type ConversationEventSink = Arc<dyn Fn(ConversationEvent) + Send + Sync>;

/// Things that happen during a turn, in the order they happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    StateChanged {
        state: ConversationState,
    },
    /// A prompt was accepted and its reply placeholder created.
    TurnStarted {
        conversation_id: Uuid,
        message_id: Uuid,
    },
    /// A new reply placeholder was created after a tool round.
    RoundStarted {
        message_id: Uuid,
        round: u32,
    },
    /// One throttled append to a streaming message.
    MessageDelta {
        message_id: Uuid,
        text: String,
    },
    ToolCallsDetected {
        message_id: Uuid,
        calls: Vec<ToolCall>,
    },
    ToolResults {
        message_id: Uuid,
        results: Vec<ToolCallResult>,
    },
    /// Calls were recorded but not run because the round limit was hit.
    RoundLimitReached {
        message_id: Uuid,
        limit: u32,
    },
    MessageCompleted {
        message: Message,
    },
    TurnFailed {
        message_id: Option<Uuid>,
        error: String,
    },
    Cancelled {
        message_id: Uuid,
    },
    ConversationsChanged,
}
