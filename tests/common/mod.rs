//! Shared test helpers: a scripted chat backend, recording event sink and test tools.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use parley::config::ParleyConfig;
use parley::conversation::{
    ConversationEvent, ConversationEventSink, ConversationHandle, ConversationSnapshot,
    Orchestrator, OrchestratorDeps,
};
use parley::error::{ParleyError, Result};
use parley::models::LanguageModel;
use parley::provider::{ChatBackend, ChatRequest, ChatStream};
use parley::storage::{MemoryStorage, Storage};
use parley::tools::{FnTool, Tool, ToolParameters, ToolRegistry};
use parley::types::{ChatChunk, ToolCall};

/// One scripted reply to `open`.
pub enum Reply {
    Chunks(Vec<Result<ChatChunk>>),
    Live(mpsc::UnboundedReceiver<Result<ChatChunk>>),
    OpenError(String),
}

/// Backend that answers each `open` with the next queued reply.
pub struct ScriptedBackend {
    reachable: AtomicBool,
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            reachable: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Queue a reply streamed as the given fragments, then `done`.
    pub fn push_text(&self, fragments: &[&str]) {
        let mut chunks: Vec<_> = fragments.iter().map(|f| Ok(ChatChunk::text(*f))).collect();
        chunks.push(Ok(ChatChunk::done()));
        self.push(Reply::Chunks(chunks));
    }

    /// Queue a reply carrying native tool calls.
    pub fn push_tool_calls(&self, calls: Vec<ToolCall>) {
        self.push(Reply::Chunks(vec![Ok(ChatChunk::done().with_tool_calls(calls))]));
    }

    pub fn push_chunks(&self, chunks: Vec<Result<ChatChunk>>) {
        self.push(Reply::Chunks(chunks));
    }

    /// Queue a reply driven by the returned sender.
    pub fn push_live(&self) -> mpsc::UnboundedSender<Result<ChatChunk>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Reply::Live(rx));
        tx
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    async fn open(&self, request: ChatRequest) -> Result<ChatStream> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Chunks(chunks)) => Ok(Box::pin(stream::iter(chunks))),
            Some(Reply::Live(rx)) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            Some(Reply::OpenError(message)) => Err(ParleyError::Stream(message)),
            None => Err(ParleyError::Stream("no scripted reply left".into())),
        }
    }

    async fn list_models(&self) -> Result<Vec<LanguageModel>> {
        Ok(vec![LanguageModel::named("llama3.2")])
    }
}

/// Collects every event the orchestrator emits.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<ConversationEvent>>>);

impl EventLog {
    pub fn sink(&self) -> ConversationEventSink {
        let events = self.0.clone();
        Arc::new(move |event: ConversationEvent| events.lock().unwrap().push(event))
    }

    pub fn events(&self) -> Vec<ConversationEvent> {
        self.0.lock().unwrap().clone()
    }

    /// Text of every throttled append, in order.
    pub fn deltas(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ConversationEvent::MessageDelta { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

/// A running orchestrator plus the collaborators tests inspect.
pub struct Harness {
    pub handle: ConversationHandle,
    pub backend: Arc<ScriptedBackend>,
    pub storage: Arc<MemoryStorage>,
    pub events: EventLog,
}

pub fn test_config() -> ParleyConfig {
    ParleyConfig {
        web_tools_enabled: false,
        ..ParleyConfig::default()
    }
}

pub fn spawn(registry: ToolRegistry, config: ParleyConfig) -> Harness {
    let backend = ScriptedBackend::new();
    let storage = Arc::new(MemoryStorage::new());
    let events = EventLog::default();
    let handle = Orchestrator::spawn(OrchestratorDeps {
        backend: backend.clone(),
        storage: storage.clone() as Arc<dyn Storage>,
        registry: Arc::new(registry),
        config,
        event_sink: Some(events.sink()),
    });
    Harness {
        handle,
        backend,
        storage,
        events,
    }
}

/// Orchestrator with the built-in date/time tools.
pub fn spawn_builtin() -> Harness {
    let config = test_config();
    spawn(ToolRegistry::builtin(&config), config)
}

/// Wait (bounded) until `predicate` holds for the current snapshot.
pub async fn wait_until(
    handle: &ConversationHandle,
    predicate: impl Fn(&ConversationSnapshot) -> bool,
) -> ConversationSnapshot {
    let mut rx = handle.watch();
    let snapshot = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|s| predicate(s)))
        .await
        .expect("timed out waiting for snapshot")
        .expect("orchestrator stopped")
        .clone();
    snapshot
}

/// Tool that counts its invocations and answers "ok".
pub fn counting_tool(name: &str, counter: Arc<AtomicUsize>) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        name,
        "Counts invocations",
        ToolParameters::empty(),
        move |_args, _ctx| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("ok".to_string())
            }
        },
    ))
}

/// Tool that sleeps before answering with `output`.
pub fn delayed_tool(name: &str, delay: Duration, output: &str) -> Arc<dyn Tool> {
    let output = output.to_string();
    Arc::new(FnTool::new(
        name,
        "Answers after a delay",
        ToolParameters::empty(),
        move |_args, _ctx| {
            let output = output.clone();
            async move {
                tokio::time::sleep(delay).await;
                Ok(output)
            }
        },
    ))
}
