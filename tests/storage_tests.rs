//! Conversations persisted to disk survive an orchestrator restart.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use common::{test_config, EventLog, ScriptedBackend};
use parley::conversation::{ConversationHandle, Orchestrator, OrchestratorDeps, PromptRequest};
use parley::storage::{FileStorage, Storage};
use parley::tools::ToolRegistry;
use parley::types::Role;

fn spawn_on(dir: &TempDir, backend: Arc<ScriptedBackend>) -> ConversationHandle {
    let config = test_config();
    Orchestrator::spawn(OrchestratorDeps {
        backend,
        storage: Arc::new(FileStorage::new(dir.path())),
        registry: Arc::new(ToolRegistry::builtin(&config)),
        config,
        event_sink: Some(EventLog::default().sink()),
    })
}

#[tokio::test]
async fn conversation_is_reloaded_after_restart() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new();
    backend.push_text(&["Hello ", "there."]);

    let first = spawn_on(&dir, backend.clone());
    first
        .send_prompt(PromptRequest::new("Hi!", "llama3.2"))
        .await
        .unwrap();
    let before = first.wait_for_idle().await;
    first.shutdown().await.unwrap();
    let conversation = before.conversation.clone().unwrap();

    let second = spawn_on(&dir, backend);
    let listed = second.load_conversations().await.unwrap();
    assert_eq!(listed, vec![conversation.clone()]);

    second.select_conversation(conversation.id).await.unwrap();
    let after = second.snapshot();
    assert_eq!(after.messages, before.messages);
    let roles: Vec<_> = after.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    assert_eq!(after.last_reply().unwrap().content, "Hello there.");
}

#[tokio::test]
async fn deleting_everything_clears_the_directory() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new();
    backend.push_text(&["One."]);

    let handle = spawn_on(&dir, backend);
    handle
        .send_prompt(PromptRequest::new("first", "llama3.2"))
        .await
        .unwrap();
    handle.wait_for_idle().await;
    handle.delete_all_conversations().await.unwrap();

    let storage = FileStorage::new(dir.path());
    assert!(storage.fetch_conversations().await.unwrap().is_empty());
}
