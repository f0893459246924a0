//! Persistence boundary for conversations and messages.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Conversation, Message};

/// Async store for conversations and their messages.
///
/// Messages come back from [`fetch_messages`](Storage::fetch_messages) in
/// creation order. Deleting a conversation deletes its messages.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_message(&self, message: &Message) -> Result<()>;
    async fn update_message(&self, message: &Message) -> Result<()>;
    async fn delete_message(&self, id: Uuid) -> Result<()>;
    async fn fetch_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>>;

    async fn create_conversation(&self, conversation: &Conversation) -> Result<()>;
    async fn update_conversation(&self, conversation: &Conversation) -> Result<()>;
    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>>;
    /// All conversations, most recently updated first.
    async fn fetch_conversations(&self) -> Result<Vec<Conversation>>;
    async fn delete_conversation(&self, id: Uuid) -> Result<()>;
    async fn delete_conversations(&self) -> Result<()>;
}

fn sort_conversations(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
