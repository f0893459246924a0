//! In-process storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{sort_conversations, Storage};
use crate::error::{ParleyError, Result};
use crate::types::{Conversation, Message};

#[derive(Debug, Default)]
struct Tables {
    conversations: HashMap<Uuid, Conversation>,
    /// Insertion order is creation order.
    messages: Vec<Message>,
}

/// Storage backed by in-memory maps. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_message(&self, message: &Message) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.messages.iter().any(|m| m.id == message.id) {
            return Err(ParleyError::storage(format!("message {} already exists", message.id)));
        }
        tables.messages.push(message.clone());
        Ok(())
    }

    async fn update_message(&self, message: &Message) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.messages.iter_mut().find(|m| m.id == message.id) {
            Some(slot) => {
                *slot = message.clone();
                Ok(())
            }
            None => Err(ParleyError::storage(format!("message {} not found", message.id))),
        }
    }

    async fn delete_message(&self, id: Uuid) -> Result<()> {
        self.tables.write().await.messages.retain(|m| m.id != id);
        Ok(())
    }

    async fn fetch_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        Ok(self
            .tables
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.tables
            .write()
            .await
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.conversations.get_mut(&conversation.id) {
            Some(slot) => {
                *slot = conversation.clone();
                Ok(())
            }
            None => Err(ParleyError::storage(format!(
                "conversation {} not found",
                conversation.id
            ))),
        }
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        Ok(self.tables.read().await.conversations.get(&id).cloned())
    }

    async fn fetch_conversations(&self) -> Result<Vec<Conversation>> {
        let mut all: Vec<_> = self
            .tables
            .read()
            .await
            .conversations
            .values()
            .cloned()
            .collect();
        sort_conversations(&mut all);
        Ok(all)
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.conversations.remove(&id);
        tables.messages.retain(|m| m.conversation_id != id);
        Ok(())
    }

    async fn delete_conversations(&self) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.conversations.clear();
        tables.messages.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_come_back_in_creation_order() {
        let storage = MemoryStorage::new();
        let conversation = Conversation::new("greeting");
        storage.create_conversation(&conversation).await.unwrap();

        let first = Message::user(conversation.id, "hi");
        let mut second = Message::assistant_placeholder(conversation.id);
        storage.create_message(&first).await.unwrap();
        storage.create_message(&second).await.unwrap();
        storage
            .create_message(&Message::user(uuid::Uuid::new_v4(), "elsewhere"))
            .await
            .unwrap();

        second.content = "hello".into();
        second.done = true;
        storage.update_message(&second).await.unwrap();

        let messages = storage.fetch_messages(conversation.id).await.unwrap();
        assert_eq!(messages, vec![first, second]);
    }

    #[tokio::test]
    async fn updating_missing_rows_is_an_error() {
        let storage = MemoryStorage::new();
        let msg = Message::user(Uuid::new_v4(), "ghost");
        assert!(matches!(
            storage.update_message(&msg).await,
            Err(ParleyError::Storage(_))
        ));
        assert!(storage
            .update_conversation(&Conversation::new("ghost"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn deleting_a_conversation_drops_its_messages() {
        let storage = MemoryStorage::new();
        let keep = Conversation::new("keep");
        let drop = Conversation::new("drop");
        storage.create_conversation(&keep).await.unwrap();
        storage.create_conversation(&drop).await.unwrap();
        storage.create_message(&Message::user(keep.id, "a")).await.unwrap();
        storage.create_message(&Message::user(drop.id, "b")).await.unwrap();

        storage.delete_conversation(drop.id).await.unwrap();
        assert_eq!(storage.fetch_conversations().await.unwrap(), vec![keep.clone()]);
        assert!(storage.fetch_messages(drop.id).await.unwrap().is_empty());

        storage.delete_conversations().await.unwrap();
        assert!(storage.fetch_conversations().await.unwrap().is_empty());
        assert!(storage.fetch_messages(keep.id).await.unwrap().is_empty());
    }
}
