//! Coalescing of streamed text.
//!
//! Backends emit many tiny fragments; observers want a handful of updates per
//! second. [`StreamBuffer`] accumulates fragments until someone flushes it;
//! [`ThrottleTransform`] drives such a buffer from a timer over a chat stream.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::provider::ChatStream;
use crate::types::ChatChunk;

/// Default flush cadence.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Append-only text accumulator, drained by [`flush`](Self::flush).
#[derive(Debug, Default, Clone)]
pub struct StreamBuffer {
    pending: String,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) {
        self.pending.push_str(fragment);
    }

    /// Take everything pushed since the last flush, or `None` if nothing was.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Trait for transforming a chat stream.
pub trait StreamTransform: Send + Sync {
    fn transform(&self, stream: ChatStream) -> ChatStream;
}

/// Re-chunk a stream so text arrives at most once per interval.
///
/// Text fragments are merged in order. Chunks carrying tool calls or the
/// end-of-turn flag are forwarded right away, preceded by any pending text. An
/// error first releases pending text, then ends the stream.
pub struct ThrottleTransform {
    interval: Duration,
}

impl ThrottleTransform {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for ThrottleTransform {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL)
    }
}

impl StreamTransform for ThrottleTransform {
    fn transform(&self, stream: ChatStream) -> ChatStream {
        let interval = self.interval;
        let transformed = async_stream::stream! {
            let mut inner = stream;
            let mut buffer = StreamBuffer::new();
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let next = tokio::select! {
                    _ = ticker.tick() => None,
                    item = inner.next() => Some(item),
                };

                match next {
                    None => {
                        if let Some(text) = buffer.flush() {
                            yield Ok(ChatChunk::text(text));
                        }
                    }
                    Some(Some(Ok(chunk))) => {
                        if let Some(text) = &chunk.content {
                            buffer.push(text);
                        }
                        if chunk.done || !chunk.tool_calls.is_empty() {
                            yield Ok(ChatChunk {
                                content: buffer.flush(),
                                tool_calls: chunk.tool_calls,
                                done: chunk.done,
                            });
                        }
                    }
                    Some(Some(Err(e))) => {
                        if let Some(text) = buffer.flush() {
                            yield Ok(ChatChunk::text(text));
                        }
                        yield Err(e);
                        break;
                    }
                    Some(None) => {
                        if let Some(text) = buffer.flush() {
                            yield Ok(ChatChunk::text(text));
                        }
                        break;
                    }
                }
            }
        };
        Box::pin(transformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParleyError;
    use crate::types::ToolCall;
    use futures::stream;
    use pretty_assertions::assert_eq;

    #[test]
    fn flush_drains_in_push_order() {
        let mut buffer = StreamBuffer::new();
        assert_eq!(buffer.flush(), None);
        buffer.push("He");
        buffer.push("l");
        buffer.push("lo");
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.flush().as_deref(), Some("Hello"));
        assert!(buffer.is_empty());
        assert_eq!(buffer.flush(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_within_interval_is_one_chunk() {
        let source: ChatStream = Box::pin(stream::iter(vec![
            Ok(ChatChunk::text("a")),
            Ok(ChatChunk::text("b")),
            Ok(ChatChunk::text("c")),
            Ok(ChatChunk::done()),
        ]));
        let out: Vec<_> = ThrottleTransform::default()
            .transform(source)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();

        assert_eq!(
            out,
            vec![ChatChunk {
                content: Some("abc".into()),
                tool_calls: vec![],
                done: true,
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stream_is_flushed_on_ticks() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<crate::error::Result<ChatChunk>>();
        let source: ChatStream =
            Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx));
        let mut throttled = ThrottleTransform::new(Duration::from_millis(100)).transform(source);

        tx.send(Ok(ChatChunk::text("Hel"))).unwrap();
        tx.send(Ok(ChatChunk::text("lo"))).unwrap();
        let first = throttled.next().await.unwrap().unwrap();
        assert_eq!(first.content.as_deref(), Some("Hello"));
        assert!(!first.done);

        tx.send(Ok(ChatChunk::text(" world"))).unwrap();
        drop(tx);
        let second = throttled.next().await.unwrap().unwrap();
        assert_eq!(second.content.as_deref(), Some(" world"));
        assert!(throttled.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn tool_calls_and_errors_flush_pending_text_first() {
        let call = ToolCall::new("c1", "get_timestamp", "{}");
        let source: ChatStream = Box::pin(stream::iter(vec![
            Ok(ChatChunk::text("x")),
            Ok(ChatChunk::default().with_tool_calls(vec![call.clone()])),
            Ok(ChatChunk::text("y")),
            Err(ParleyError::Stream("connection reset".into())),
            Ok(ChatChunk::text("never")),
        ]));
        let out: Vec<_> = ThrottleTransform::default().transform(source).collect().await;

        assert_eq!(out.len(), 3);
        let first = out[0].as_ref().unwrap();
        assert_eq!(first.content.as_deref(), Some("x"));
        assert_eq!(first.tool_calls, vec![call]);
        assert_eq!(out[1].as_ref().unwrap().content.as_deref(), Some("y"));
        assert!(matches!(out[2], Err(ParleyError::Stream(_))));
    }
}
