//! Incremental server-sent-events record decoder.
//!
//! Feeds arbitrary byte chunks; yields complete record payloads. A record
//! is one or more `data:` lines terminated by a blank line; all other lines
//! (comments, event names, ids) are ignored. Both CRLF and LF line endings
//! are accepted.

/// Stateful SSE decoder for a single stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    data: Vec<String>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes; returns every record completed by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut records = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    records.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(payload) = line.strip_prefix("data:") {
                self.data.push(payload.strip_prefix(' ').unwrap_or(payload).to_string());
            }
            // non-data fields are ignored
        }
        records
    }

    /// Flush a trailing record that was never terminated by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let trailing = self.buffer.trim_end_matches(['\n', '\r']).to_string();
        self.buffer.clear();
        if let Some(payload) = trailing.strip_prefix("data:") {
            self.data
                .push(payload.strip_prefix(' ').unwrap_or(payload).to_string());
        }
        if self.data.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.data).join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_record_lf() {
        let mut decoder = SseDecoder::new();
        let records = decoder.feed(b"data: {\"a\":1}\n\n");
        assert_eq!(records, vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_single_record_crlf() {
        let mut decoder = SseDecoder::new();
        let records = decoder.feed(b"data: {\"a\":1}\r\n\r\n");
        assert_eq!(records, vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_record_split_across_feeds() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"a\"").is_empty());
        assert!(decoder.feed(b":1}\n").is_empty());
        let records = decoder.feed(b"\n");
        assert_eq!(records, vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_multiple_data_lines_joined() {
        let mut decoder = SseDecoder::new();
        let records = decoder.feed(b"data: first\ndata: second\n\n");
        assert_eq!(records, vec!["first\nsecond"]);
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut decoder = SseDecoder::new();
        let records = decoder.feed(b": keepalive\nevent: ping\nid: 7\ndata: x\n\n");
        assert_eq!(records, vec!["x"]);
    }

    #[test]
    fn test_multiple_records_in_one_feed() {
        let mut decoder = SseDecoder::new();
        let records = decoder.feed(b"data: one\n\ndata: two\n\n");
        assert_eq!(records, vec!["one", "two"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_record() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: tail\n").is_empty());
        assert_eq!(decoder.finish(), Some("tail".to_string()));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_finish_handles_partial_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: partial").is_empty());
        assert_eq!(decoder.finish(), Some("partial".to_string()));
    }

    #[test]
    fn test_data_without_space() {
        let mut decoder = SseDecoder::new();
        let records = decoder.feed(b"data:tight\n\n");
        assert_eq!(records, vec!["tight"]);
    }
}
