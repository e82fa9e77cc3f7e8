//! Upstream chunk normalization.
//!
//! Chunks arrive in heterogeneous shapes: raw SSE `data:` payloads,
//! event-tagged objects, or (via the direct fallback transport) one
//! complete response object. Normalization maps them all onto a small
//! tagged model instead of sniffing arbitrary fields.

use serde_json::Value;
use tracing::debug;

use super::repair::repair_json;
use crate::clients::engine::EngineChunk;

/// Sentinel line marking end-of-stream. Dropped, never forwarded.
pub const STREAM_TERMINATOR: &str = "[DONE]";

/// A normalized upstream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A content token; consecutive tokens merge into the message.
    Token(String),
    /// Any non-content event, buffered as a structured trail.
    Metadata(Value),
    /// End of stream.
    End,
}

/// Normalize one upstream chunk. `None` means the chunk was
/// unrecoverable and must be dropped without aborting the stream.
pub fn normalize_chunk(chunk: EngineChunk) -> Option<StreamEvent> {
    match chunk {
        EngineChunk::Raw(data) => {
            let trimmed = data.trim();
            if trimmed == STREAM_TERMINATOR {
                return Some(StreamEvent::End);
            }
            match repair_json(trimmed) {
                Some(value) => classify(value),
                None => {
                    debug!(fragment = %trimmed, "dropped unrecoverable stream fragment");
                    None
                }
            }
        }
        EngineChunk::Parsed(value) => classify(value),
    }
}

fn classify(value: Value) -> Option<StreamEvent> {
    if let Some(event) = value.get("event").and_then(Value::as_str) {
        return match event {
            "token" => value
                .get("data")
                .and_then(Value::as_str)
                .map(|data| StreamEvent::Token(data.to_string())),
            "end" => Some(StreamEvent::End),
            _ => Some(StreamEvent::Metadata(value)),
        };
    }
    // The direct transport answers with one object carrying `text`.
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        return Some(StreamEvent::Token(text.to_string()));
    }
    // A bare JSON string is a content fragment.
    if let Some(s) = value.as_str() {
        return Some(StreamEvent::Token(s.to_string()));
    }
    Some(StreamEvent::Metadata(value))
}
