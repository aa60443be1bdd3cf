//! Incremental server-sent-events decoder.
//!
//! Bytes are buffered until a full line is available so that UTF-8 sequences
//! and field names split across network chunks are reassembled before
//! parsing.

use std::collections::VecDeque;

/// Terminal payload of OpenAI-style streams.
pub const DONE_MARKER: &str = "[DONE]";

/// Decodes `data:` payloads out of an SSE byte stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
    ready: VecDeque<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk. Completed events become available through
    /// [`SseDecoder::next_event`].
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.process_line(&String::from_utf8_lossy(&line));
        }
    }

    /// Next completed event payload, oldest first.
    pub fn next_event(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// Treat end of input as a final line terminator and dispatch whatever
    /// event was still open.
    pub fn finish(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&line).trim_end_matches('\r').to_owned();
            self.process_line(&line);
        }
        self.dispatch();
    }

    fn process_line(&mut self, line: &str) {
        if line.is_empty() {
            self.dispatch();
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_owned());
        }
    }

    fn dispatch(&mut self) {
        if self.data.is_empty() {
            return;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        self.ready.push_back(payload);
    }
}
