//! Decoder for OpenAI-style server-sent event streams.

use drafter_core::error::DrafterError;
use serde::Deserialize;

/// One decoded item from the event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Token(String),
    Done,
    Error(DrafterError),
}

/// Incremental line decoder.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a network chunk and returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = decode_line(line.trim_end_matches(['\r', '\n'])) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left once the connection closes.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        decode_line(line.trim_end_matches(['\r', '\n']))
            .into_iter()
            .collect()
    }
}

#[derive(Deserialize)]
struct ChunkEnvelope {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<Delta>,
    /// Legacy completions endpoints stream `text` instead of a delta.
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn decode_line(line: &str) -> Option<SseEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let envelope: ChunkEnvelope = match serde_json::from_str(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("[SseDecoder] Ignoring undecodable chunk: {}", e);
            return None;
        }
    };

    if let Some(error) = envelope.error {
        return Some(SseEvent::Error(DrafterError::server(500, error.message)));
    }

    let token: String = envelope
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.and_then(|d| d.content).or(choice.text))
        .collect();

    (!token.is_empty()).then_some(SseEvent::Token(token))
}
