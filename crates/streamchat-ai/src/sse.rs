//! Line decoder for the chat API's `data:` stream.
//!
//! Each line prefixed with `data:` carries either a JSON object
//! `{"type": "assistant", "reply": "..."}` or the sentinel `[DONE]`. Anything
//! else is ignored. A line that claims to be data but does not decode is
//! logged and skipped; it never ends the stream.

use serde::Deserialize;

use crate::error::{AiError, Result};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
const ASSISTANT_TYPE: &str = "assistant";

/// Decoded stream item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Next piece of assistant text.
    Fragment(String),
    /// End-of-stream sentinel.
    Done,
}

#[derive(Deserialize)]
struct DataPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    reply: Option<String>,
}

/// Decode one complete line.
///
/// `Ok(None)` means the line is not part of the protocol (comments, other
/// event fields, payloads of other types, empty replies).
pub fn decode_line(line: &str) -> Result<Option<StreamEvent>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == DONE_SENTINEL {
        return Ok(Some(StreamEvent::Done));
    }

    let payload: DataPayload =
        serde_json::from_str(data).map_err(|e| AiError::Parse(format!("{e}: {data}")))?;

    if payload
        .kind
        .as_deref()
        .is_some_and(|kind| kind != ASSISTANT_TYPE)
    {
        return Ok(None);
    }

    Ok(payload
        .reply
        .filter(|reply| !reply.is_empty())
        .map(StreamEvent::Fragment))
}

/// Incremental decoder fed with raw byte chunks.
///
/// Bytes are buffered until a newline arrives, so lines (and multi-byte
/// characters) split across chunk boundaries decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    skipped_lines: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the events of every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_into(&line[..line.len() - 1], &mut events);
        }
        events
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_into(&line, &mut events);
        }
        events
    }

    /// Number of malformed data lines dropped so far.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    fn decode_into(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        let line = String::from_utf8_lossy(raw);
        match decode_line(&line) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(err) => {
                self.skipped_lines += 1;
                tracing::warn!(error = %err, "Skipping malformed stream line");
            }
        }
    }
}
