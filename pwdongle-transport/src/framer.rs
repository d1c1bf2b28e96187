//! Byte stream to line framing.

use tracing::warn;

/// Longest line kept before it is force-terminated.
pub const MAX_LINE_LEN: usize = 4096;

/// One received line without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    /// The line ended with CRLF rather than a bare LF
    pub crlf: bool,
}

impl Line {
    pub fn new(text: impl Into<String>, crlf: bool) -> Self {
        Self {
            text: text.into(),
            crlf,
        }
    }
}

/// Accumulates bytes and splits them on `\n`.
///
/// A `\r` directly before the `\n` is stripped and reported through
/// [`Line::crlf`]; a `\r` anywhere else stays in the text. Invalid UTF-8 is
/// replaced rather than rejected.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every line they complete.
    pub fn push(&mut self, data: &[u8]) -> Vec<Line> {
        let mut lines = Vec::new();
        for &byte in data {
            if byte == b'\n' {
                lines.push(self.finish());
                continue;
            }
            if self.buf.len() >= MAX_LINE_LEN {
                warn!("Line exceeds {} bytes, splitting", MAX_LINE_LEN);
                lines.push(self.finish());
            }
            self.buf.push(byte);
        }
        lines
    }

    /// Bytes waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn finish(&mut self) -> Line {
        let crlf = self.buf.last() == Some(&b'\r');
        if crlf {
            self.buf.pop();
        }
        let text = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Line { text, crlf }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lf_and_crlf() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"HELP\nABOUT\r\n");
        assert_eq!(lines, vec![Line::new("HELP", false), Line::new("ABOUT", true)]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_partial_lines_span_pushes() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"PWUP").is_empty());
        assert_eq!(framer.pending(), 4);
        let lines = framer.push(b"DATE\r");
        assert!(lines.is_empty());
        let lines = framer.push(b"\n");
        assert_eq!(lines, vec![Line::new("PWUPDATE", true)]);
    }

    #[test]
    fn test_empty_line() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"\r\n\n");
        assert_eq!(lines, vec![Line::new("", true), Line::new("", false)]);
    }

    #[test]
    fn test_overlong_line_is_split() {
        let mut framer = LineFramer::new();
        let data = vec![b'x'; MAX_LINE_LEN + 10];
        let lines = framer.push(&data);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text.len(), MAX_LINE_LEN);
        assert_eq!(framer.pending(), 10);
    }
}
