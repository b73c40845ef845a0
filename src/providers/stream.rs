use super::models::OpenAiStreamChunk;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A non-empty text fragment from `choices[0].delta.content`.
    Delta(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Incremental decoder for `data: {json}` lines.
///
/// Bytes are fed as they arrive from the transport. Incomplete UTF-8 sequences and
/// incomplete lines are carried over to the next `feed` call, so frames split across
/// chunk boundaries are decoded intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    byte_buf: Vec<u8>,
    line_buf: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.byte_buf.extend_from_slice(bytes);
        let decoded = self.decode_available();
        self.line_buf.push_str(&decoded);

        let mut frames = Vec::new();
        while let Some(line_end) = self.line_buf.find('\n') {
            let line = self.line_buf[..line_end].trim_end_matches('\r').to_string();
            self.line_buf.drain(..=line_end);
            if let Some(frame) = parse_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush whatever is left once the transport reports end of body.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        if !self.byte_buf.is_empty() {
            let rest = String::from_utf8_lossy(&self.byte_buf).into_owned();
            self.byte_buf.clear();
            self.line_buf.push_str(&rest);
        }

        let mut frames = self.feed(&[]);
        let tail = std::mem::take(&mut self.line_buf);
        if let Some(frame) = parse_line(tail.trim_end_matches('\r')) {
            frames.push(frame);
        }
        frames
    }

    // Decode as much valid UTF-8 as possible from the byte buffer
    fn decode_available(&mut self) -> String {
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.byte_buf) {
                Ok(s) => {
                    out.push_str(s);
                    self.byte_buf.clear();
                    return out;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.byte_buf[..valid_up_to]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.byte_buf.drain(..valid_up_to + bad);
                        }
                        // Truncated sequence: wait for the rest of it
                        None => {
                            self.byte_buf.drain(..valid_up_to);
                            return out;
                        }
                    }
                }
            }
        }
    }
}

fn parse_line(line: &str) -> Option<SseFrame> {
    let payload = if let Some(p) = line.strip_prefix("data: ") {
        p
    } else if let Some(p) = line.strip_prefix("data:") {
        p
    } else {
        return None;
    };

    if payload.trim() == "[DONE]" {
        return Some(SseFrame::Done);
    }

    match serde_json::from_str::<OpenAiStreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map(SseFrame::Delta),
        Err(e) => {
            tracing::warn!("Failed to parse SSE data: {} (line: {})", e, line);
            None
        }
    }
}
