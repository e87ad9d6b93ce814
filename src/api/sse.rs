//! Server-Sent-Events framing and chat-completion chunk decoding.
//!
//! Chunks from the byte stream may end mid-line; the parser buffers the
//! partial tail until the next chunk completes it. Only `data: ` lines carry
//! payloads; everything else (blank keep-alives, `event:` lines, comments)
//! is ignored. Malformed payloads are logged at debug and skipped so one bad
//! frame cannot abort the stream.

use serde::Deserialize;
use tracing::debug;

use crate::types::{FinishReason, StreamDelta, ToolCallFragment};

/// One parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// A decoded chat-completion chunk.
    Delta(StreamDelta),
    /// The `[DONE]` sentinel ending the stream.
    Done,
}

/// Incremental SSE parser; feed it raw chunks, collect decoded events.
#[derive(Debug, Default)]
pub struct StreamParser {
    buffer: String,
}

impl StreamParser {
    /// Creates an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one raw chunk and returns the events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].trim().to_string();
            self.buffer.drain(..=pos);

            let Some(payload) = line.strip_prefix("data: ") else {
                continue;
            };
            if payload == "[DONE]" {
                events.push(SseEvent::Done);
                continue;
            }
            match decode_chunk(payload) {
                Some(delta) if !delta.is_empty() => events.push(SseEvent::Delta(delta)),
                Some(_) => {}
                None => {
                    debug!(payload = %payload, "skipping malformed SSE payload");
                }
            }
        }
        events
    }
}

/// Decodes one chat-completion chunk payload into a [`StreamDelta`].
fn decode_chunk(payload: &str) -> Option<StreamDelta> {
    let chunk: ChatChunk = serde_json::from_str(payload).ok()?;
    let choice = chunk.choices.into_iter().next()?;

    let mut delta = StreamDelta {
        finish_reason: choice.finish_reason,
        ..Default::default()
    };
    if let Some(wire) = choice.delta {
        delta.text = wire.content.filter(|t| !t.is_empty());
        delta.reasoning = wire.reasoning_content.filter(|t| !t.is_empty());
        delta.tool_calls = wire
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallFragment {
                index: call.index,
                id: call.id,
                name: call.function.as_ref().and_then(|f| f.name.clone()),
                arguments: call.function.and_then(|f| f.arguments),
            })
            .collect();
    }
    Some(delta)
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: Option<WireDelta>,
    finish_reason: Option<FinishReason>,
}

#[derive(Deserialize)]
struct WireDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<WireFunction>,
}

#[derive(Deserialize)]
struct WireFunction {
    name: Option<String>,
    arguments: Option<String>,
}
