//! Incremental `text/event-stream` frame parser.
//!
//! Chunks may split lines and frames anywhere; the parser buffers the tail
//! and yields a frame each time a blank line terminates one.

use bytes::Bytes;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// OpenRouter terminates chat streams with `data: [DONE]`.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, chunk: &Bytes) -> Vec<SseFrame> {
        self.push_str(&String::from_utf8_lossy(chunk))
    }

    pub fn push_str(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                self.finish_frame(&mut frames);
            } else {
                self.field(&line);
            }
        }

        frames
    }

    /// Flushes whatever is buffered once the stream has ended.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        let mut line = std::mem::take(&mut self.buffer);
        if line.ends_with('\r') {
            line.pop();
        }
        if !line.is_empty() {
            self.field(&line);
        }
        self.finish_frame(&mut frames);
        frames
    }

    fn field(&mut self, line: &str) {
        // Comment lines keep the connection alive (OpenRouter sends `: OPENROUTER PROCESSING`).
        if line.starts_with(':') {
            return;
        }
        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match name {
            "event" => self.event = (!value.is_empty()).then(|| value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            _ => {}
        }
    }

    fn finish_frame(&mut self, frames: &mut Vec<SseFrame>) {
        if self.event.is_none() && self.data_lines.is_empty() {
            return;
        }
        frames.push(SseFrame {
            event: self.event.take(),
            data: self.data_lines.join("\n"),
        });
        self.data_lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push_str("data: {\"a\"").is_empty());
        assert!(parser.push_str(":1}\r\n").is_empty());
        let frames = parser.push_str("\r\ndata: [DONE]\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "{\"a\":1}");
        assert!(frames[1].is_done());
    }

    #[test]
    fn comments_are_skipped_and_multiline_data_joined() {
        let mut parser = SseParser::new();
        let frames = parser.push_str(": OPENROUTER PROCESSING\n\nevent: error\ndata: one\ndata: two\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("error".to_string()),
                data: "one\ntwo".to_string(),
            }]
        );
    }

    #[test]
    fn finish_flushes_unterminated_frame() {
        let mut parser = SseParser::new();
        assert!(parser.push_bytes(&Bytes::from_static(b"data: tail")).is_empty());
        let frames = parser.finish();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "tail");
        assert!(parser.finish().is_empty());
    }
}
