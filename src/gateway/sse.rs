//! Incremental decoder for `text/event-stream` bodies
//!
//! Bytes are fed as they arrive from the network; complete events (text
//! between blank lines) come out as their joined `data:` payloads.

/// Payload that marks the end of an OpenAI-style completion stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Buffering SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a blank line
    buffer: String,
}

impl SseDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the data payloads of every completed event
    ///
    /// # Examples
    ///
    /// ```
    /// use aio_chat::gateway::sse::SseDecoder;
    ///
    /// let mut decoder = SseDecoder::new();
    /// assert!(decoder.push(b"data: {\"a\"").is_empty());
    /// assert_eq!(decoder.push(b":1}\n\n"), vec!["{\"a\":1}".to_string()]);
    /// ```
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        // A multi-byte character may be split across chunks; keep its head.
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let decoded = String::from_utf8_lossy(&self.pending[..valid]).replace('\r', "");
        self.pending.drain(..valid);
        self.buffer.push_str(&decoded);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(data) = event_data(&block[..pos]) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let rest = String::from_utf8_lossy(&self.pending).replace('\r', "");
            self.buffer.push_str(&rest);
            self.pending.clear();
        }
        let block = std::mem::take(&mut self.buffer);
        event_data(block.trim_end_matches('\n'))
    }
}

/// Extract the joined `data:` lines of one event block
///
/// Comments, `id:`/`retry:` fields and `ping` events yield nothing.
fn event_data(block: &str) -> Option<String> {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_type: Option<&str> = None;

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
    }

    if matches!(event_type, Some(et) if et.eq_ignore_ascii_case("ping")) {
        return None;
    }

    let data = data_lines.join("\n");
    if data.trim().is_empty() {
        None
    } else {
        Some(data)
    }
}
