// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Line framing for the incoming byte stream.

use tracing::warn;

/// Default line delimiter.
pub const DEFAULT_DELIMITER: u8 = b'\n';

/// Default upper bound for an unterminated line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// How incoming bytes are split into lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFraming {
    pub delimiter: u8,
    /// Strip one `\r` in front of the delimiter.
    pub trim_carriage_return: bool,
    /// Longest unterminated line kept before it is emitted as-is.
    pub max_line_length: usize,
}

impl Default for LineFraming {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            trim_carriage_return: true,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Accumulates bytes until a delimiter completes a line.
///
/// Output does not depend on how the stream was chunked: feeding `"AB"`,
/// `"CD\n"` and `"EF\nGH\n"` yields `"ABCD"`, `"EF"` and `"GH"` in any split.
#[derive(Debug)]
pub struct LineBuffer {
    framing: LineFraming,
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new(framing: LineFraming) -> Self {
        Self {
            framing,
            buffer: Vec::with_capacity(framing.max_line_length.min(4096)),
        }
    }

    /// Append a chunk and return every line it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|b| *b == self.framing.delimiter) {
            self.buffer.extend_from_slice(&rest[..pos]);
            lines.push(self.take_line());
            rest = &rest[pos + 1..];
        }

        self.buffer.extend_from_slice(rest);

        let max = self.framing.max_line_length.max(1);
        while self.buffer.len() > max {
            warn!(
                "Line exceeds {} bytes without delimiter, emitting partial line",
                max
            );
            let tail = self.buffer.split_off(self.split_point(max));
            let head = std::mem::replace(&mut self.buffer, tail);
            lines.push(String::from_utf8_lossy(&head).into_owned());
        }

        lines
    }

    /// Largest cut at or below `max` that does not split a UTF-8 sequence.
    /// Never returns 0, so an overlong run always shrinks.
    fn split_point(&self, max: usize) -> usize {
        let mut at = max;
        while at > 1 && (self.buffer[at] & 0xC0) == 0x80 {
            at -= 1;
        }
        at
    }

    fn take_line(&mut self) -> String {
        let mut line = std::mem::take(&mut self.buffer);
        if self.framing.trim_carriage_return && line.last() == Some(&b'\r') {
            line.pop();
        }
        match String::from_utf8(line) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }

    /// Bytes received after the last delimiter.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Discard the partial line.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(LineFraming::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_independent_of_chunking() {
        let mut buffer = LineBuffer::default();

        assert!(buffer.push(b"AB").is_empty());
        assert_eq!(buffer.push(b"CD\n"), vec!["ABCD"]);
        assert_eq!(buffer.push(b"EF\nGH"), vec!["EF"]);
        assert_eq!(buffer.pending(), b"GH");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = LineBuffer::default();
        let mut lines = Vec::new();
        for byte in b"one\ntwo\nthr" {
            lines.extend(buffer.push(std::slice::from_ref(byte)));
        }
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(buffer.pending(), b"thr");
    }

    #[test]
    fn test_empty_lines_are_emitted() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.push(b"\n\nx\n"), vec!["", "", "x"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_carriage_return_trimmed() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.push(b"temp=21\r\nhum=40\r"), vec!["temp=21"]);
        assert_eq!(buffer.push(b"\n"), vec!["hum=40"]);
    }

    #[test]
    fn test_carriage_return_kept_when_disabled() {
        let mut buffer = LineBuffer::new(LineFraming {
            trim_carriage_return: false,
            ..LineFraming::default()
        });
        assert_eq!(buffer.push(b"a\r\n"), vec!["a\r"]);
    }

    #[test]
    fn test_custom_delimiter() {
        let mut buffer = LineBuffer::new(LineFraming {
            delimiter: b';',
            ..LineFraming::default()
        });
        assert_eq!(buffer.push(b"a;b\nc;"), vec!["a", "b\nc"]);
    }

    #[test]
    fn test_overlong_line_is_split() {
        let mut buffer = LineBuffer::new(LineFraming {
            max_line_length: 4,
            ..LineFraming::default()
        });
        assert_eq!(buffer.push(b"abcdefghij"), vec!["abcd", "efgh"]);
        assert_eq!(buffer.pending(), b"ij");
        assert_eq!(buffer.push(b"\n"), vec!["ij"]);
    }

    #[test]
    fn test_overlong_split_keeps_characters_whole() {
        let mut buffer = LineBuffer::new(LineFraming {
            max_line_length: 4,
            ..LineFraming::default()
        });
        let mut lines = buffer.push("aéé".as_bytes());
        assert_eq!(lines, vec!["aé"]);
        lines.extend(buffer.push(b"\n"));
        assert_eq!(lines.concat(), "aéé");
    }

    #[test]
    fn test_overlong_split_of_continuation_bytes_makes_progress() {
        let mut buffer = LineBuffer::new(LineFraming {
            max_line_length: 2,
            ..LineFraming::default()
        });
        let lines = buffer.push(b"\x80\x80\x80\x80");
        assert_eq!(lines.len(), 2);
        assert_eq!(buffer.pending(), b"\x80\x80");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut buffer = LineBuffer::default();
        let lines = buffer.push(b"ok\xff\n");
        assert_eq!(lines, vec!["ok\u{FFFD}"]);
    }

    #[test]
    fn test_clear_discards_partial_line() {
        let mut buffer = LineBuffer::default();
        buffer.push(b"partial");
        buffer.clear();
        assert_eq!(buffer.push(b"next\n"), vec!["next"]);
    }
}
