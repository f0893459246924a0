//! Conversation orchestrator.
//!
//! A single task owns every conversation, message and the active exchange.
//! Callers talk to it through a cloneable [`ConversationHandle`]:
//!
//! - [`ConversationHandle::send_prompt`] starts a turn
//! - [`ConversationHandle::cancel`] stops it, keeping the text received so far
//! - [`ConversationHandle::watch`] observes state through snapshots
//! - [`ConversationHandle::wait_for_idle`] waits for the turn to end
//!
//! A turn streams the reply into an assistant message, runs any tool calls
//! found in it, and resumes generation with the results until the model
//! answers in plain text or the round limit is hit.

mod actor;
pub mod events;
pub mod history;

pub use events::{ConversationEvent, ConversationEventSink};
pub use history::build_history;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use crate::config::ParleyConfig;
use crate::error::{ParleyError, Result};
use crate::models::LanguageModel;
use crate::provider::ChatBackend;
use crate::storage::Storage;
use crate::tools::ToolRegistry;
use crate::types::{ChatOptions, Conversation, ConversationState, ImageAttachment, Message};

use actor::{Actor, Command};

const COMMAND_BUFFER: usize = 32;

/// Everything the orchestrator needs.
pub struct OrchestratorDeps {
    pub backend: Arc<dyn ChatBackend>,
    pub storage: Arc<dyn Storage>,
    pub registry: Arc<ToolRegistry>,
    pub config: ParleyConfig,
    pub event_sink: Option<ConversationEventSink>,
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationSnapshot {
    pub state: ConversationState,
    pub conversation: Option<Conversation>,
    /// Messages of the selected conversation, in creation order.
    pub messages: Vec<Message>,
    pub conversations: Vec<Conversation>,
}

impl ConversationSnapshot {
    /// The most recent assistant message.
    pub fn last_reply(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::types::Role::Assistant)
    }
}

/// A user prompt and how to answer it.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub prompt: String,
    pub model: LanguageModel,
    pub image: Option<ImageAttachment>,
    /// Used only when the conversation has no messages yet. Falls back to the
    /// configured system prompt.
    pub system_prompt: Option<String>,
    /// Edit point: this message and everything after it are deleted first.
    pub trim_from_message_id: Option<Uuid>,
    pub options: ChatOptions,
}

impl PromptRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<LanguageModel>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            image: None,
            system_prompt: None,
            trim_from_message_id: None,
            options: ChatOptions::default(),
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Replace the conversation from `message_id` onwards.
    pub fn editing(mut self, message_id: Uuid) -> Self {
        self.trim_from_message_id = Some(message_id);
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }
}

/// Entry point for spawning the orchestrator task.
pub struct Orchestrator;

impl Orchestrator {
    /// Spawn the orchestrator on the current tokio runtime.
    ///
    /// The task stops after [`ConversationHandle::shutdown`] or once every
    /// handle is dropped.
    pub fn spawn(deps: OrchestratorDeps) -> ConversationHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(ConversationSnapshot::default());
        tokio::spawn(Actor::new(deps, commands_rx, snapshot_tx).run());
        ConversationHandle {
            commands: commands_tx,
            snapshot_rx,
        }
    }
}

/// Cloneable handle to a running orchestrator.
#[derive(Debug, Clone)]
pub struct ConversationHandle {
    commands: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<ConversationSnapshot>,
}

impl ConversationHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())
    }

    /// Start a turn. Returns once the prompt is persisted and the exchange is
    /// opening; blank prompts are ignored. A turn already in progress is
    /// cancelled first.
    pub async fn send_prompt(&self, request: PromptRequest) -> Result<()> {
        self.request(|reply| Command::SendPrompt { request, reply })
            .await?
    }

    /// Stop the active turn. Returns `false` when there was none.
    pub async fn cancel(&self) -> Result<bool> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    /// Deselect the current conversation; the next prompt creates a new one.
    pub async fn new_conversation(&self) -> Result<()> {
        self.request(|reply| Command::NewConversation { reply })
            .await?
    }

    pub async fn select_conversation(&self, id: Uuid) -> Result<()> {
        self.request(|reply| Command::SelectConversation { id, reply })
            .await?
    }

    pub async fn load_conversations(&self) -> Result<Vec<Conversation>> {
        self.request(|reply| Command::LoadConversations { reply })
            .await?
    }

    pub async fn delete_conversation(&self, id: Uuid) -> Result<()> {
        self.request(|reply| Command::DeleteConversation { id, reply })
            .await?
    }

    pub async fn delete_all_conversations(&self) -> Result<()> {
        self.request(|reply| Command::DeleteAllConversations { reply })
            .await?
    }

    /// Toggle tool calling for the current conversation and for new ones.
    pub async fn set_tools_enabled(&self, enabled: bool) -> Result<()> {
        self.request(|reply| Command::SetToolsEnabled { enabled, reply })
            .await?
    }

    /// Subscribe to snapshot changes.
    pub fn watch(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Wait until no turn is in progress and return the snapshot at that point.
    pub async fn wait_for_idle(&self) -> ConversationSnapshot {
        let mut rx = self.snapshot_rx.clone();
        if let Ok(snapshot) = rx.wait_for(|snapshot| !snapshot.state.is_loading()).await {
            return snapshot.clone();
        }
        let snapshot = rx.borrow().clone();
        snapshot
    }

    /// Cancel any active turn and stop the task.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

fn stopped() -> ParleyError {
    ParleyError::InvalidState("orchestrator has stopped".into())
}
