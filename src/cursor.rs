//! Character cursor over the input stream.
//!
//! The translator is single-pass: every byte is consumed exactly once, and
//! all keyword tests use bounded lookahead through an internal buffer
//! instead of consuming and pushing back. Newlines are counted when a byte
//! is consumed, so the reported line of a diagnostic is always the number
//! of newlines consumed before the failure, plus one.

use std::collections::VecDeque;
use std::io::{BufRead, Read};

/// Upper bound on lookahead, in bytes. Keyword probes never need more.
pub const MAX_LOOKAHEAD: usize = 16;

/// Buffered cursor with bounded, non-consuming lookahead.
pub struct Cursor<R: BufRead> {
    reader: R,
    ahead: VecDeque<u8>,
    line: u32,
    eof: bool,
}

impl<R: BufRead> Cursor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            ahead: VecDeque::with_capacity(MAX_LOOKAHEAD),
            line: 1,
            eof: false,
        }
    }

    /// Current line number (1-based, advanced on every consumed newline).
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Ensure at least `n` bytes are buffered, or fewer if the stream ends.
    fn fill(&mut self, n: usize) -> std::io::Result<()> {
        debug_assert!(n <= MAX_LOOKAHEAD);
        while self.ahead.len() < n && !self.eof {
            let mut byte = [0u8; 1];
            match self.reader.read(&mut byte)? {
                0 => self.eof = true,
                _ => self.ahead.push_back(byte[0]),
            }
        }
        Ok(())
    }

    /// Next byte without consuming it.
    pub fn peek(&mut self) -> std::io::Result<Option<u8>> {
        self.fill(1)?;
        Ok(self.ahead.front().copied())
    }

    /// Byte `k` positions ahead without consuming anything.
    pub fn peek_at(&mut self, k: usize) -> std::io::Result<Option<u8>> {
        self.fill(k + 1)?;
        Ok(self.ahead.get(k).copied())
    }

    /// Consume and return the next byte.
    pub fn bump(&mut self) -> std::io::Result<Option<u8>> {
        self.fill(1)?;
        let c = self.ahead.pop_front();
        if c == Some(b'\n') {
            self.line += 1;
        }
        Ok(c)
    }

    /// True once the stream is exhausted and the buffer drained.
    pub fn at_eof(&mut self) -> std::io::Result<bool> {
        Ok(self.peek()?.is_none())
    }

    /// Test whether the upcoming bytes spell `word` followed by a
    /// non-identifier byte (or end of input). Consumes nothing.
    pub fn peek_word(&mut self, word: &str) -> std::io::Result<bool> {
        let bytes = word.as_bytes();
        debug_assert!(bytes.len() < MAX_LOOKAHEAD);
        self.fill(bytes.len() + 1)?;
        if self.ahead.len() < bytes.len() {
            return Ok(false);
        }
        for (k, &b) in bytes.iter().enumerate() {
            if self.ahead[k] != b {
                return Ok(false);
            }
        }
        match self.ahead.get(bytes.len()) {
            Some(&next) => Ok(!is_id_char(next)),
            None => Ok(true),
        }
    }
}

/// Identifier continuation byte: alphanumeric or underscore.
pub fn is_id_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Identifier start byte: alphabetic or underscore.
pub fn is_id_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(s: &str) -> Cursor<&[u8]> {
        Cursor::new(s.as_bytes())
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut c = cursor("ab");
        assert_eq!(c.peek().unwrap(), Some(b'a'));
        assert_eq!(c.peek().unwrap(), Some(b'a'));
        assert_eq!(c.bump().unwrap(), Some(b'a'));
        assert_eq!(c.peek().unwrap(), Some(b'b'));
    }

    #[test]
    fn test_line_counts_consumed_newlines() {
        let mut c = cursor("a\nb\nc");
        assert_eq!(c.line(), 1);
        while c.bump().unwrap().is_some() {}
        assert_eq!(c.line(), 3);
    }

    #[test]
    fn test_lookahead_does_not_advance_line() {
        let mut c = cursor("\n\nx");
        assert_eq!(c.peek_at(2).unwrap(), Some(b'x'));
        assert_eq!(c.line(), 1);
    }

    #[test]
    fn test_peek_word_boundary() {
        let mut c = cursor("void x");
        assert!(c.peek_word("void").unwrap());
        let mut c = cursor("voidx");
        assert!(!c.peek_word("void").unwrap());
        let mut c = cursor("void");
        assert!(c.peek_word("void").unwrap());
    }

    #[test]
    fn test_eof() {
        let mut c = cursor("");
        assert!(c.at_eof().unwrap());
        assert_eq!(c.bump().unwrap(), None);
    }
}
