//! Incremental decoder for newline-delimited JSON streams.
//!
//! Chunks arrive split at arbitrary byte boundaries. A trailing partial line
//! stays buffered until its newline arrives; lines that fail to parse are
//! skipped and counted, never fatal.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

#[derive(Debug)]
pub struct NdjsonDecoder<T> {
    buffer: Vec<u8>,
    skipped: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> NdjsonDecoder<T> {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            skipped: 0,
            _marker: PhantomData,
        }
    }

    /// Feed one chunk and return every complete value it finished.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<T> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let complete: Vec<u8> = self.buffer.drain(..=last_newline).collect();
        complete
            .split(|b| *b == b'\n')
            .filter_map(|line| self.parse_line(line))
            .collect()
    }

    /// Flush whatever is left once the stream has ended.
    ///
    /// A final line without a terminating newline is parsed here.
    pub fn finish(mut self) -> Option<T> {
        let rest = std::mem::take(&mut self.buffer);
        self.parse_line(&rest)
    }

    /// Number of non-empty lines that could not be parsed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn parse_line(&mut self, line: &[u8]) -> Option<T> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        match serde_json::from_slice(line) {
            Ok(value) => Some(value),
            Err(e) => {
                self.skipped += 1;
                tracing::debug!(error = %e, "Skipping unparsable stream line");
                None
            }
        }
    }
}

impl<T: DeserializeOwned> Default for NdjsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn partial_line_is_buffered_until_newline() {
        let mut decoder = NdjsonDecoder::<Value>::new();
        assert!(decoder.push(br#"{"type":"pro"#).is_empty());
        let values = decoder.push(b"gress\"}\n{\"type\":");
        assert_eq!(values, vec![json!({"type": "progress"})]);
        let values = decoder.push(b"\"done\"}\n");
        assert_eq!(values, vec![json!({"type": "done"})]);
    }

    #[test]
    fn unparsable_lines_are_skipped() {
        let mut decoder = NdjsonDecoder::<Value>::new();
        let values = decoder.push(b"{\"a\":1}\nnot json\n\n{\"b\":2}\n");
        assert_eq!(values, vec![json!({"a": 1}), json!({"b": 2})]);
        assert_eq!(decoder.skipped(), 1);
    }

    #[test]
    fn finish_parses_unterminated_tail() {
        let mut decoder = NdjsonDecoder::<Value>::new();
        assert!(decoder.push(b"{\"last\":true}").is_empty());
        assert_eq!(decoder.finish(), Some(json!({"last": true})));
    }
}
