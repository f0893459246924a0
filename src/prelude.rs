//! Convenience re-exports for common use.

pub use crate::config::{ParleyConfig, ToolResultProtocol};
pub use crate::conversation::{
    ConversationEvent, ConversationHandle, ConversationSnapshot, Orchestrator, OrchestratorDeps,
    PromptRequest,
};
pub use crate::error::{ParleyError, Result, ToolError};
pub use crate::extract::{extract_tool_calls, ParsedResponse};
pub use crate::models::LanguageModel;
pub use crate::provider::{ChatBackend, OllamaBackend};
pub use crate::storage::{FileStorage, MemoryStorage, Storage};
pub use crate::tools::{FnTool, Tool, ToolArguments, ToolParameters, ToolRegistry};
pub use crate::types::{
    ChatChunk, Conversation, ConversationState, Message, Role, ToolCall, ToolCallResult,
};
