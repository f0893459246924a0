//! Turning stored messages into the backend's chat history.

use crate::config::ToolResultProtocol;
use crate::provider::ChatMessage;
use crate::types::{Message, Role};

/// Build the history sent to the backend.
///
/// Errored assistant messages are skipped. An assistant message that carries
/// tool results is followed by those results, shaped per `protocol`, in call
/// order. Reasoning blocks are not sent back.
pub fn build_history(messages: &[Message], protocol: ToolResultProtocol) -> Vec<ChatMessage> {
    let mut history = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            Role::Assistant if message.error => continue,
            Role::Assistant => {
                let content = message
                    .visible_content()
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                history.push(ChatMessage {
                    tool_calls: message.tool_calls.clone(),
                    ..ChatMessage::new(Role::Assistant, content)
                });
                push_tool_results(&mut history, message, protocol);
            }
            role => history.push(ChatMessage {
                images: message.image.iter().map(|i| i.data.clone()).collect(),
                ..ChatMessage::new(role, message.content.clone())
            }),
        }
    }
    history
}

fn push_tool_results(history: &mut Vec<ChatMessage>, message: &Message, protocol: ToolResultProtocol) {
    let answered: Vec<_> = message
        .tool_calls
        .iter()
        .filter_map(|call| {
            message
                .tool_results
                .iter()
                .find(|r| r.tool_call_id == call.id)
                .map(|result| (call, result))
        })
        .collect();
    if answered.is_empty() {
        return;
    }

    match protocol {
        ToolResultProtocol::ToolRole => {
            for (call, result) in answered {
                history.push(ChatMessage::tool_result(
                    call.name(),
                    &call.id,
                    result.content_for_model(),
                ));
            }
        }
        ToolResultProtocol::UserMessage => {
            let mut text = String::from("Tool results:");
            for (call, result) in answered {
                text.push_str(&format!(
                    "\n- {} ({}): {}",
                    call.name(),
                    call.id,
                    result.content_for_model()
                ));
            }
            history.push(ChatMessage::new(Role::User, text));
        }
    }
}
