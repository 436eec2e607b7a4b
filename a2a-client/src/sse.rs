//! Incremental decoder for the A2A server-sent event line protocol.
//!
//! The wire format is a sequence of `data: <json>` lines. Network chunks do
//! not align with line boundaries, so the decoder carries the trailing
//! partial line between calls to [`SseLineDecoder::feed`].

use a2a_types::{StreamEvent, SSE_DONE_SENTINEL};

/// One decoded frame from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    /// A parsed task update event.
    Event(StreamEvent),
    /// The `[DONE]` sentinel closing the stream.
    Done,
}

/// Stateful line decoder. Feed raw chunks, get complete frames back.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: String,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode all complete lines in `chunk` plus whatever was buffered.
    ///
    /// Lines that do not start with `data:` (comments, blank keep-alives)
    /// are ignored, as are payloads that fail to parse. Nothing after a
    /// `Done` frame is decoded.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();
            if payload.is_empty() {
                continue;
            }
            if payload == SSE_DONE_SENTINEL {
                frames.push(SseFrame::Done);
                break;
            }
            match serde_json::from_str::<StreamEvent>(payload) {
                Ok(event) => frames.push(SseFrame::Event(event)),
                Err(error) => {
                    tracing::warn!(%error, payload, "skipping malformed stream event");
                }
            }
        }
        frames
    }
}
