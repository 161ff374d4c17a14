//! ============================================================================
//! SSE Decoder - Server-sent-event framing for streamed completions
//! ============================================================================
//! Network chunks do not line up with frames, so bytes are buffered until a
//! newline arrives. Only `data:` lines carry content; `[DONE]` ends the stream.
//! ============================================================================

use tracing::warn;

use super::types::StreamChunk;

/// Stream terminator sent by OpenAI-compatible servers
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Non-empty text delta from `choices[0].delta.content`
    Delta(String),
    /// `data: [DONE]`
    Done,
}

/// Incremental line splitter. Buffers raw bytes so a multi-byte character
/// split across two network chunks is decoded intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, returning events for every completed line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&line))
    }
}

/// Parse one SSE line. Blank lines, comments and non-data fields yield nothing.
pub fn parse_line(line: &str) -> Option<SseEvent> {
    let line = line.trim_end_matches(['\n', '\r']);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data).trim();

    if data.is_empty() {
        return None;
    }
    if data == DONE_SENTINEL {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk.first_delta().map(SseEvent::Delta),
        Err(e) => {
            warn!("Failed to parse stream chunk: {} - data: {}", e, data);
            None
        }
    }
}
