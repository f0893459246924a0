//! JSON-file storage: one file per conversation under a base directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{sort_conversations, Storage};
use crate::error::{ParleyError, Result};
use crate::types::{Conversation, Message};

const FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConversationFile {
    version: u32,
    conversation: Conversation,
    #[serde(default)]
    messages: Vec<Message>,
    saved_at: DateTime<Utc>,
}

/// File-backed storage.
///
/// Every write rewrites the whole conversation file through a temp file and
/// a rename, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileStorage {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.base_dir.join(format!("{id}.json"))
    }

    async fn read(&self, id: Uuid) -> Result<Option<ConversationFile>> {
        let raw = match fs::read_to_string(self.path_for(id)).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let file: ConversationFile = serde_json::from_str(&raw)
            .map_err(|e| ParleyError::storage(format!("conversation {id}: {e}")))?;
        Ok(Some(file))
    }

    async fn read_existing(&self, id: Uuid) -> Result<ConversationFile> {
        self.read(id)
            .await?
            .ok_or_else(|| ParleyError::storage(format!("conversation {id} not found")))
    }

    async fn write(&self, mut file: ConversationFile) -> Result<()> {
        fs::create_dir_all(&self.base_dir).await?;
        file.version = FILE_VERSION;
        file.saved_at = Utc::now();
        let path = self.path_for(file.conversation.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&file)?).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Ids of every conversation file on disk.
    async fn ids(&self) -> Result<Vec<Uuid>> {
        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn create_message(&self, message: &Message) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_existing(message.conversation_id).await?;
        if file.messages.iter().any(|m| m.id == message.id) {
            return Err(ParleyError::storage(format!("message {} already exists", message.id)));
        }
        file.messages.push(message.clone());
        self.write(file).await
    }

    async fn update_message(&self, message: &Message) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_existing(message.conversation_id).await?;
        let slot = file
            .messages
            .iter_mut()
            .find(|m| m.id == message.id)
            .ok_or_else(|| ParleyError::storage(format!("message {} not found", message.id)))?;
        *slot = message.clone();
        self.write(file).await
    }

    async fn delete_message(&self, id: Uuid) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        for conversation_id in self.ids().await? {
            if let Some(mut file) = self.read(conversation_id).await? {
                let before = file.messages.len();
                file.messages.retain(|m| m.id != id);
                if file.messages.len() != before {
                    return self.write(file).await;
                }
            }
        }
        Ok(())
    }

    async fn fetch_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        Ok(self
            .read(conversation_id)
            .await?
            .map(|file| file.messages)
            .unwrap_or_default())
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let messages = self
            .read(conversation.id)
            .await?
            .map(|file| file.messages)
            .unwrap_or_default();
        self.write(ConversationFile {
            version: FILE_VERSION,
            conversation: conversation.clone(),
            messages,
            saved_at: Utc::now(),
        })
        .await
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_existing(conversation.id).await?;
        file.conversation = conversation.clone();
        self.write(file).await
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        Ok(self.read(id).await?.map(|file| file.conversation))
    }

    async fn fetch_conversations(&self) -> Result<Vec<Conversation>> {
        let mut all = Vec::new();
        for id in self.ids().await? {
            match self.read(id).await {
                Ok(Some(file)) => all.push(file.conversation),
                Ok(None) => {}
                Err(e) => tracing::warn!(conversation_id = %id, error = %e, "skipping unreadable conversation"),
            }
        }
        sort_conversations(&mut all);
        Ok(all)
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.remove(id).await
    }

    async fn delete_conversations(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        for id in self.ids().await? {
            self.remove(id).await?;
        }
        Ok(())
    }
}
