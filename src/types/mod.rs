//! Core data model: messages, conversations, tool calls and stream chunks.

pub mod conversation;
pub mod message;
pub mod stream;
pub mod tool_call;

pub use conversation::*;
pub use message::*;
pub use stream::*;
pub use tool_call::*;
