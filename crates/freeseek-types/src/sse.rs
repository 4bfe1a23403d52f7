//! Incremental decoder for `text/event-stream` bodies.
//!
//! Network chunks split events at arbitrary byte offsets, including inside
//! multi-byte UTF-8 sequences, so the decoder buffers bytes until a full
//! event (`\n\n`-terminated) is available and only then yields its `data:`
//! payload. Used on both sides of the system: the server's completion
//! gateway reads an upstream SSE body through it, and the client reads the
//! server's own stream the same way.

/// Streaming SSE event decoder. Feed raw body chunks with [`SseDecoder::push`]
/// and collect complete `data:` payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    byte_buf: Vec<u8>,
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one body chunk and return every complete event payload it
    /// finished. Multiple `data:` lines within one event are concatenated,
    /// per the SSE framing rules.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.byte_buf.extend_from_slice(bytes);

        // Decode as much valid UTF-8 as possible; a trailing partial
        // sequence stays buffered until its continuation bytes arrive.
        let decoded = match std::str::from_utf8(&self.byte_buf) {
            Ok(s) => {
                let decoded = s.to_owned();
                self.byte_buf.clear();
                decoded
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                if valid_up_to == 0 {
                    return Vec::new();
                }
                let decoded = std::str::from_utf8(&self.byte_buf[..valid_up_to])
                    .expect("validated prefix")
                    .to_owned();
                self.byte_buf.drain(..valid_up_to);
                decoded
            }
        };

        self.buffer.push_str(&decoded.replace("\r\n", "\n"));

        let mut payloads = Vec::new();
        while let Some(event_end) = self.buffer.find("\n\n") {
            let event_text = self.buffer[..event_end].to_owned();
            self.buffer.drain(..event_end + 2);

            let mut data = String::new();
            for line in event_text.lines() {
                if let Some(payload) = line.strip_prefix("data: ") {
                    data.push_str(payload);
                } else if let Some(payload) = line.strip_prefix("data:") {
                    data.push_str(payload);
                }
            }
            if !data.is_empty() {
                payloads.push(data);
            }
        }
        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_event_in_one_chunk() {
        let mut dec = SseDecoder::new();
        assert_eq!(dec.push(b"data: {\"a\":1}\n\n"), vec!["{\"a\":1}"]);
    }

    #[test]
    fn event_split_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.push(b"data: hel").is_empty());
        assert_eq!(dec.push(b"lo\n\n"), vec!["hello"]);
    }

    #[test]
    fn several_events_in_one_chunk() {
        let mut dec = SseDecoder::new();
        assert_eq!(dec.push(b"data: a\n\ndata: b\n\n"), vec!["a", "b"]);
    }

    #[test]
    fn multi_byte_utf8_split_mid_sequence() {
        let mut dec = SseDecoder::new();
        let text = "data: héllo\n\n".as_bytes();
        // Split inside the two-byte 'é'.
        let cut = text.iter().position(|&b| b == 0xc3).unwrap() + 1;
        assert!(dec.push(&text[..cut]).is_empty());
        assert_eq!(dec.push(&text[cut..]), vec!["héllo"]);
    }

    #[test]
    fn crlf_delimiters_are_normalized() {
        let mut dec = SseDecoder::new();
        assert_eq!(dec.push(b"data: x\r\n\r\n"), vec!["x"]);
    }

    #[test]
    fn prefix_without_space_is_accepted() {
        let mut dec = SseDecoder::new();
        assert_eq!(dec.push(b"data:y\n\n"), vec!["y"]);
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut dec = SseDecoder::new();
        assert_eq!(dec.push(b"event: ping\ndata: z\n\n"), vec!["z"]);
    }
}
