//! The orchestrator task: single owner of conversation state and the active exchange.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{ConversationEvent, ConversationEventSink};
use super::history::build_history;
use super::{ConversationSnapshot, PromptRequest};
use crate::buffer::StreamBuffer;
use crate::config::ParleyConfig;
use crate::error::{ParleyError, Result, ToolError};
use crate::extract::extract_tool_calls;
use crate::provider::{ChatBackend, ChatRequest, ChatStream};
use crate::storage::Storage;
use crate::tools::ToolExecutor;
use crate::types::{
    ChatChunk, ChatOptions, Conversation, ConversationState, Message, ToolCall, ToolCallResult,
};

const NAME_MAX_CHARS: usize = 48;

pub(super) enum Command {
    SendPrompt {
        request: PromptRequest,
        reply: oneshot::Sender<Result<()>>,
    },
    Cancel {
        reply: oneshot::Sender<bool>,
    },
    NewConversation {
        reply: oneshot::Sender<Result<()>>,
    },
    SelectConversation {
        id: Uuid,
        reply: oneshot::Sender<Result<()>>,
    },
    LoadConversations {
        reply: oneshot::Sender<Result<Vec<Conversation>>>,
    },
    DeleteConversation {
        id: Uuid,
        reply: oneshot::Sender<Result<()>>,
    },
    DeleteAllConversations {
        reply: oneshot::Sender<Result<()>>,
    },
    SetToolsEnabled {
        enabled: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Tool tasks of one round. Dropping it aborts them.
struct ToolRound(JoinHandle<Vec<ToolCallResult>>);

impl Drop for ToolRound {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum Phase {
    /// Probing the backend and opening the stream.
    Connecting(BoxFuture<'static, Result<ChatStream>>),
    Streaming(ChatStream),
    RunningTools(ToolRound),
}

enum Progress {
    Opened(Result<ChatStream>),
    Chunk(Option<Result<ChatChunk>>),
    Tick,
    ToolsFinished(std::result::Result<Vec<ToolCallResult>, JoinError>),
}

/// One prompt's worth of backend exchanges and tool rounds.
struct Exchange {
    /// The assistant message currently receiving output.
    message_id: Uuid,
    model: String,
    options: ChatOptions,
    /// Tool definitions go out with every request of this exchange.
    offer_tools: bool,
    /// Tool calls in the reply are honored.
    tools_enabled: bool,
    /// Tool rounds executed so far.
    round: u32,
    phase: Phase,
    buffer: StreamBuffer,
    flush_interval: Duration,
    ticker: Interval,
    native_calls: Vec<ToolCall>,
}

impl Exchange {
    async fn progress(&mut self) -> Progress {
        match &mut self.phase {
            Phase::Connecting(open) => Progress::Opened(open.await),
            Phase::Streaming(stream) => tokio::select! {
                chunk = stream.next() => Progress::Chunk(chunk),
                _ = self.ticker.tick() => Progress::Tick,
            },
            Phase::RunningTools(round) => Progress::ToolsFinished((&mut round.0).await),
        }
    }

    fn start_streaming(&mut self, stream: ChatStream) {
        self.phase = Phase::Streaming(stream);
        self.ticker = flush_ticker(self.flush_interval);
    }

    fn next_round(&mut self, message_id: Uuid, open: BoxFuture<'static, Result<ChatStream>>) {
        self.message_id = message_id;
        self.round += 1;
        self.phase = Phase::Connecting(open);
        self.buffer = StreamBuffer::new();
        self.native_calls.clear();
    }
}

fn flush_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_progress(exchange: &mut Option<Exchange>) -> Progress {
    match exchange {
        Some(exchange) => exchange.progress().await,
        None => std::future::pending().await,
    }
}

enum Wake {
    Command(Command),
    Progress(Progress),
}

pub(super) struct Actor {
    backend: Arc<dyn ChatBackend>,
    storage: Arc<dyn Storage>,
    executor: ToolExecutor,
    config: ParleyConfig,
    event_sink: Option<ConversationEventSink>,
    commands: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
    state: ConversationState,
    conversation: Option<Conversation>,
    messages: Vec<Message>,
    conversations: Vec<Conversation>,
    /// Tool setting for conversations created from now on.
    tools_enabled: bool,
    exchange: Option<Exchange>,
}

impl Actor {
    pub(super) fn new(
        deps: super::OrchestratorDeps,
        commands: mpsc::Receiver<Command>,
        snapshot_tx: watch::Sender<ConversationSnapshot>,
    ) -> Self {
        Self {
            backend: deps.backend,
            storage: deps.storage,
            executor: ToolExecutor::new(deps.registry),
            tools_enabled: deps.config.tools_enabled,
            config: deps.config,
            event_sink: deps.event_sink,
            commands,
            snapshot_tx,
            state: ConversationState::Idle,
            conversation: None,
            messages: Vec::new(),
            conversations: Vec::new(),
            exchange: None,
        }
    }

    pub(super) async fn run(mut self) {
        self.refresh_conversations().await;
        self.publish();

        loop {
            let wake = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => break,
                },
                progress = next_progress(&mut self.exchange) => Wake::Progress(progress),
            };
            match wake {
                Wake::Command(Command::Shutdown { reply }) => {
                    self.cancel().await;
                    let _ = reply.send(());
                    break;
                }
                Wake::Command(command) => self.handle_command(command).await,
                Wake::Progress(progress) => self.handle_progress(progress).await,
            }
        }
        debug!("orchestrator stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::SendPrompt { request, reply } => {
                let _ = reply.send(self.send_prompt(request).await);
            }
            Command::Cancel { reply } => {
                let _ = reply.send(self.cancel().await);
            }
            Command::NewConversation { reply } => {
                let _ = reply.send(self.new_conversation());
            }
            Command::SelectConversation { id, reply } => {
                let _ = reply.send(self.select_conversation(id).await);
            }
            Command::LoadConversations { reply } => {
                let _ = reply.send(self.load_conversations().await);
            }
            Command::DeleteConversation { id, reply } => {
                let _ = reply.send(self.delete_conversation(id).await);
            }
            Command::DeleteAllConversations { reply } => {
                let _ = reply.send(self.delete_all_conversations().await);
            }
            Command::SetToolsEnabled { enabled, reply } => {
                let _ = reply.send(self.set_tools_enabled(enabled).await);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    // -- Turn protocol --

    async fn send_prompt(&mut self, request: PromptRequest) -> Result<()> {
        if request.prompt.trim().is_empty() {
            debug!("ignoring blank prompt");
            return Ok(());
        }
        if self.exchange.is_some() {
            self.cancel().await;
        }
        if let Err(e) = self.start_turn(request).await {
            if !matches!(e, ParleyError::InvalidState(_)) {
                self.fail_turn(&e).await;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn start_turn(&mut self, request: PromptRequest) -> Result<()> {
        if let Some(edit_point) = request.trim_from_message_id {
            self.truncate_from(edit_point).await?;
        }

        let conversation_id = self.ensure_conversation(&request.prompt).await?;
        if let Some(conversation) = self.conversation.as_mut() {
            conversation.model = Some(request.model.name.clone());
            conversation.touch();
            self.storage.update_conversation(conversation).await?;
        }

        if self.messages.is_empty() {
            let system = request
                .system_prompt
                .clone()
                .or_else(|| self.config.system_prompt.clone())
                .filter(|s| !s.trim().is_empty());
            if let Some(system) = system {
                self.append_message(Message::system(conversation_id, system))
                    .await?;
            }
        }
        self.append_message(
            Message::user(conversation_id, request.prompt.trim()).with_image(request.image),
        )
        .await?;

        let history = build_history(&self.messages, self.config.tool_result_protocol);
        let placeholder = Message::assistant_placeholder(conversation_id);
        let message_id = placeholder.id;
        self.append_message(placeholder).await?;

        let tools_enabled = self
            .conversation
            .as_ref()
            .map_or(self.tools_enabled, |c| c.tools_enabled)
            && !self.executor.registry().is_empty();
        let offer_tools = tools_enabled && request.model.supports_tools;
        let chat_request = self.chat_request(&request.model.name, history, offer_tools, &request.options);

        debug!(
            %conversation_id,
            model = %request.model,
            offer_tools,
            "starting turn"
        );
        self.exchange = Some(Exchange {
            message_id,
            model: request.model.name,
            options: request.options,
            offer_tools,
            tools_enabled,
            round: 0,
            phase: Phase::Connecting(self.connect(chat_request, true)),
            buffer: StreamBuffer::new(),
            flush_interval: self.config.flush_interval,
            ticker: flush_ticker(self.config.flush_interval),
            native_calls: Vec::new(),
        });
        self.emit(ConversationEvent::TurnStarted {
            conversation_id,
            message_id,
        });
        self.set_state(ConversationState::Loading);
        self.refresh_conversations().await;
        self.publish();
        Ok(())
    }

    fn chat_request(
        &self,
        model: &str,
        messages: Vec<crate::provider::ChatMessage>,
        offer_tools: bool,
        options: &ChatOptions,
    ) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages,
            tools: offer_tools.then(|| self.executor.registry().list()),
            options: options.clone(),
        }
    }

    fn connect(&self, request: ChatRequest, check_reachable: bool) -> BoxFuture<'static, Result<ChatStream>> {
        let backend = Arc::clone(&self.backend);
        async move {
            if check_reachable && !backend.reachable().await {
                return Err(ParleyError::TransportUnreachable);
            }
            backend.open(request).await
        }
        .boxed()
    }

    async fn handle_progress(&mut self, progress: Progress) {
        let Some(exchange) = self.exchange.as_mut() else {
            return;
        };
        match progress {
            Progress::Opened(Ok(stream)) => {
                info!(
                    backend = self.backend.name(),
                    model = %exchange.model,
                    round = exchange.round,
                    "exchange opened"
                );
                exchange.start_streaming(stream);
            }
            Progress::Opened(Err(e)) => self.fail_turn(e).await,
            Progress::Chunk(Some(Ok(chunk))) => {
                if let Some(text) = chunk.content.as_deref() {
                    exchange.buffer.push(text);
                }
                exchange.native_calls.extend(chunk.tool_calls);
                if chunk.done {
                    self.finish_round().await;
                }
            }
            Progress::Chunk(Some(Err(e))) => {
                self.flush_pending();
                self.fail_turn(e).await;
            }
            Progress::Chunk(None) => self.finish_round().await,
            Progress::Tick => self.flush_pending(),
            Progress::ToolsFinished(Ok(results)) => self.resume_after_tools(results).await,
            Progress::ToolsFinished(Err(e)) => {
                self.fail_turn(ToolError::execution("executor", e.to_string()))
                    .await
            }
        }
    }

    /// Move buffered text into the in-flight message.
    fn flush_pending(&mut self) {
        let Some(exchange) = self.exchange.as_mut() else {
            return;
        };
        let Some(text) = exchange.buffer.flush() else {
            return;
        };
        let message_id = exchange.message_id;
        if let Some(message) = find_message(&mut self.messages, message_id) {
            message.content.push_str(&text);
        }
        self.emit(ConversationEvent::MessageDelta { message_id, text });
        self.publish();
    }

    /// The stream finished: finalize the message or start a tool round.
    async fn finish_round(&mut self) {
        self.flush_pending();
        let Some(exchange) = self.exchange.as_mut() else {
            return;
        };
        let message_id = exchange.message_id;
        let round = exchange.round;
        let native = std::mem::take(&mut exchange.native_calls);
        let tools_enabled = exchange.tools_enabled;

        let Some(message) = find_message(&mut self.messages, message_id) else {
            self.fail_turn(ParleyError::InvalidState("in-flight message vanished".into()))
                .await;
            return;
        };

        let (calls, stripped) = if !tools_enabled {
            (Vec::new(), None)
        } else if !native.is_empty() {
            (dedupe_calls(native), None)
        } else {
            let parsed = extract_tool_calls(&message.content);
            if parsed.has_tool_calls {
                (parsed.tool_calls, Some(parsed.content))
            } else {
                (Vec::new(), None)
            }
        };

        if calls.is_empty() {
            let mut finished = message.clone();
            finished.done = true;
            self.complete(finished).await;
            return;
        }

        let mut updated = message.clone();
        if let Some(content) = stripped {
            updated.content = content;
        }
        updated.attach_tool_calls(calls.clone());

        if round >= self.config.max_tool_rounds {
            warn!(
                %message_id,
                limit = self.config.max_tool_rounds,
                tool_calls = calls.len(),
                "tool round limit reached, not executing calls"
            );
            self.emit(ConversationEvent::RoundLimitReached {
                message_id,
                limit: self.config.max_tool_rounds,
            });
            updated.done = true;
            self.complete(updated).await;
            return;
        }

        if let Err(e) = self.storage.update_message(&updated).await {
            self.fail_turn(e).await;
            return;
        }
        replace_message(&mut self.messages, updated);

        debug!(%message_id, round, tool_calls = calls.len(), "executing tool calls");
        self.emit(ConversationEvent::ToolCallsDetected {
            message_id,
            calls: calls.clone(),
        });
        self.publish();

        let executor = self.executor.clone();
        let handle = tokio::spawn(async move { executor.execute_all(&calls).await });
        if let Some(exchange) = self.exchange.as_mut() {
            exchange.phase = Phase::RunningTools(ToolRound(handle));
        }
    }

    /// Persist a finished message and end the turn.
    async fn complete(&mut self, finished: Message) {
        if let Err(e) = self.storage.update_message(&finished).await {
            self.fail_turn(e).await;
            return;
        }
        replace_message(&mut self.messages, finished.clone());
        self.exchange = None;
        info!(message_id = %finished.id, "turn completed");
        self.emit(ConversationEvent::MessageCompleted { message: finished });
        self.set_state(ConversationState::Idle);
    }

    /// Attach results, persist, and re-open the stream with the extended history.
    async fn resume_after_tools(&mut self, results: Vec<ToolCallResult>) {
        let Some(exchange) = self.exchange.as_ref() else {
            return;
        };
        let message_id = exchange.message_id;
        let Some(message) = find_message(&mut self.messages, message_id) else {
            self.fail_turn(ParleyError::InvalidState("in-flight message vanished".into()))
                .await;
            return;
        };

        let mut updated = message.clone();
        updated.attach_tool_results(results.clone());
        updated.done = true;
        if let Err(e) = self.storage.update_message(&updated).await {
            self.fail_turn(e).await;
            return;
        }
        replace_message(&mut self.messages, updated.clone());
        self.emit(ConversationEvent::ToolResults {
            message_id,
            results,
        });
        self.emit(ConversationEvent::MessageCompleted {
            message: updated.clone(),
        });

        let history = build_history(&self.messages, self.config.tool_result_protocol);
        let placeholder = Message::assistant_placeholder(updated.conversation_id);
        let next_id = placeholder.id;
        if let Err(e) = self.append_message(placeholder).await {
            self.fail_turn(e).await;
            return;
        }

        let Some(exchange) = self.exchange.as_ref() else {
            return;
        };
        let request = self.chat_request(&exchange.model, history, exchange.offer_tools, &exchange.options);
        let open = self.connect(request, false);
        let mut round = 0;
        if let Some(exchange) = self.exchange.as_mut() {
            exchange.next_round(next_id, open);
            round = exchange.round;
        }
        debug!(message_id = %next_id, round, "resuming after tool results");
        self.emit(ConversationEvent::RoundStarted {
            message_id: next_id,
            round,
        });
        self.publish();
    }

    /// Stop the active exchange, keeping whatever text already arrived.
    async fn cancel(&mut self) -> bool {
        if self.exchange.is_none() {
            return false;
        }
        self.flush_pending();
        let Some(exchange) = self.exchange.take() else {
            return false;
        };
        let message_id = exchange.message_id;
        drop(exchange);

        let mut persisted = Ok(());
        if let Some(message) = find_message(&mut self.messages, message_id) {
            message.done = true;
            message.error = false;
            persisted = self.storage.update_message(message).await;
        }
        info!(%message_id, "turn cancelled");
        self.emit(ConversationEvent::Cancelled { message_id });
        match persisted {
            Ok(()) => self.set_state(ConversationState::Idle),
            Err(e) => {
                warn!(%message_id, error = %e, "failed to persist cancelled message");
                self.set_state(ConversationState::Error(e.to_string()));
            }
        }
        true
    }

    /// End the turn with an error, flagging the in-flight message.
    async fn fail_turn(&mut self, error: impl std::fmt::Display) {
        let message_id = self.exchange.take().map(|exchange| exchange.message_id);
        let text = error.to_string();
        warn!(message_id = ?message_id, error = %text, "turn failed");

        if let Some(id) = message_id {
            if let Some(message) = find_message(&mut self.messages, id) {
                if !message.done {
                    message.error = true;
                    if let Err(e) = self.storage.update_message(message).await {
                        warn!(message_id = %id, error = %e, "failed to persist errored message");
                    }
                }
            }
        }
        self.emit(ConversationEvent::TurnFailed {
            message_id,
            error: text.clone(),
        });
        self.set_state(ConversationState::Error(text));
    }

    async fn truncate_from(&mut self, message_id: Uuid) -> Result<()> {
        let Some(index) = self.messages.iter().position(|m| m.id == message_id) else {
            return Err(ParleyError::InvalidState(format!(
                "message {message_id} is not part of the current conversation"
            )));
        };
        for message in &self.messages[index..] {
            self.storage.delete_message(message.id).await?;
        }
        debug!(%message_id, dropped = self.messages.len() - index, "truncated at edit point");
        self.messages.truncate(index);
        Ok(())
    }

    async fn ensure_conversation(&mut self, prompt: &str) -> Result<Uuid> {
        if let Some(conversation) = &self.conversation {
            return Ok(conversation.id);
        }
        let mut conversation = Conversation::new(conversation_name(prompt));
        conversation.tools_enabled = self.tools_enabled;
        self.storage.create_conversation(&conversation).await?;
        let id = conversation.id;
        self.conversation = Some(conversation);
        self.messages.clear();
        Ok(id)
    }

    async fn append_message(&mut self, message: Message) -> Result<()> {
        self.storage.create_message(&message).await?;
        self.messages.push(message);
        Ok(())
    }

    // -- Conversation management --

    fn ensure_idle(&self) -> Result<()> {
        if self.exchange.is_some() {
            return Err(ParleyError::InvalidState(
                "a reply is still in progress; cancel it first".into(),
            ));
        }
        Ok(())
    }

    fn new_conversation(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.conversation = None;
        self.messages.clear();
        self.set_state(ConversationState::Idle);
        self.publish();
        Ok(())
    }

    async fn select_conversation(&mut self, id: Uuid) -> Result<()> {
        self.ensure_idle()?;
        let conversation = self
            .storage
            .get_conversation(id)
            .await?
            .ok_or_else(|| ParleyError::storage(format!("conversation {id} not found")))?;
        self.messages = self.storage.fetch_messages(id).await?;
        self.conversation = Some(conversation);
        self.set_state(ConversationState::Idle);
        self.publish();
        Ok(())
    }

    async fn load_conversations(&mut self) -> Result<Vec<Conversation>> {
        self.conversations = self.storage.fetch_conversations().await?;
        self.emit(ConversationEvent::ConversationsChanged);
        self.publish();
        Ok(self.conversations.clone())
    }

    async fn delete_conversation(&mut self, id: Uuid) -> Result<()> {
        self.ensure_idle()?;
        self.storage.delete_conversation(id).await?;
        if self.conversation.as_ref().is_some_and(|c| c.id == id) {
            self.conversation = None;
            self.messages.clear();
        }
        self.refresh_conversations().await;
        self.publish();
        Ok(())
    }

    async fn delete_all_conversations(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.storage.delete_conversations().await?;
        self.conversation = None;
        self.messages.clear();
        self.conversations.clear();
        self.emit(ConversationEvent::ConversationsChanged);
        self.publish();
        Ok(())
    }

    async fn set_tools_enabled(&mut self, enabled: bool) -> Result<()> {
        self.tools_enabled = enabled;
        if let Some(conversation) = self.conversation.as_mut() {
            conversation.tools_enabled = enabled;
            conversation.touch();
            self.storage.update_conversation(conversation).await?;
            self.refresh_conversations().await;
        }
        self.publish();
        Ok(())
    }

    /// Reload the conversation list. Failures are logged, not reported.
    async fn refresh_conversations(&mut self) {
        match self.storage.fetch_conversations().await {
            Ok(conversations) => {
                self.conversations = conversations;
                self.emit(ConversationEvent::ConversationsChanged);
            }
            Err(e) => warn!(error = %e, "failed to refresh conversation list"),
        }
    }

    // -- Observation --

    fn set_state(&mut self, state: ConversationState) {
        if self.state != state {
            self.state = state.clone();
            self.emit(ConversationEvent::StateChanged { state });
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(ConversationSnapshot {
            state: self.state.clone(),
            conversation: self.conversation.clone(),
            messages: self.messages.clone(),
            conversations: self.conversations.clone(),
        });
    }

    fn emit(&self, event: ConversationEvent) {
        if let Some(sink) = &self.event_sink {
            sink(event);
        }
    }
}

fn find_message(messages: &mut [Message], id: Uuid) -> Option<&mut Message> {
    messages.iter_mut().rev().find(|m| m.id == id)
}

fn replace_message(messages: &mut [Message], updated: Message) {
    if let Some(slot) = find_message(messages, updated.id) {
        *slot = updated;
    }
}

/// Drop calls whose id was already seen, keeping the first.
fn dedupe_calls(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .filter(|call| seen.insert(call.id.clone()))
        .collect()
}

fn conversation_name(prompt: &str) -> String {
    let first_line = prompt.trim().lines().next().unwrap_or_default().trim();
    if first_line.chars().count() <= NAME_MAX_CHARS {
        return first_line.to_string();
    }
    let mut name: String = first_line.chars().take(NAME_MAX_CHARS).collect();
    name.push('…');
    name
}
