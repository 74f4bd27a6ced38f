//! Parse context: the single owner of the transformation.
//!
//! `ParseContext` threads the cursor, the output writer, the source file
//! name and the embed-capture buffer through every parsing primitive. The
//! invariant that matters is lockstep: every byte echoed from input to
//! output through [`ParseContext::put`] or [`ParseContext::echo`] is also
//! appended to the embed buffer while a capture is open, so a captured
//! block is exactly what the output received. Generated text goes through
//! [`ParseContext::emit`] and is never captured.

use std::io::{BufRead, Write};

use crate::cursor::{is_id_char, is_id_start, Cursor};
use crate::error::{Result, SyntaxError};
use crate::hash;

pub struct ParseContext<R: BufRead, W: Write> {
    cursor: Cursor<R>,
    out: W,
    /// Source file name, for diagnostics and `#line` mapping.
    pub file: String,
    embed: String,
    capturing: bool,
    preamble_done: bool,
}

impl<R: BufRead, W: Write> ParseContext<R, W> {
    pub fn new(reader: R, out: W, file: impl Into<String>) -> Self {
        Self {
            cursor: Cursor::new(reader),
            out,
            file: file.into(),
            embed: String::new(),
            capturing: false,
            preamble_done: false,
        }
    }

    pub fn line(&self) -> u32 {
        self.cursor.line()
    }

    /// Build a syntax error at the current position.
    pub fn err(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.file.clone(), self.cursor.line(), message)
    }

    pub fn peek(&mut self) -> Result<Option<u8>> {
        Ok(self.cursor.peek()?)
    }

    pub fn peek_at(&mut self, k: usize) -> Result<Option<u8>> {
        Ok(self.cursor.peek_at(k)?)
    }

    pub fn peek_word(&mut self, word: &str) -> Result<bool> {
        Ok(self.cursor.peek_word(word)?)
    }

    pub fn at_eof(&mut self) -> Result<bool> {
        Ok(self.cursor.at_eof()?)
    }

    /// Consume one byte without echoing it.
    pub fn bump(&mut self) -> Result<Option<u8>> {
        Ok(self.cursor.bump()?)
    }

    /// Consume one byte, echo it to the output, feed any open capture.
    pub fn put(&mut self) -> Result<u8> {
        let c = self
            .cursor
            .bump()?
            .ok_or_else(|| self.err("premature end of input"))?;
        self.out.write_all(&[c])?;
        if self.capturing {
            self.embed.push(c as char);
        }
        Ok(c)
    }

    /// Echo already-consumed token text to the output, feeding any capture.
    pub fn echo(&mut self, s: &str) -> Result<()> {
        self.out.write_all(s.as_bytes())?;
        if self.capturing {
            self.embed.push_str(s);
        }
        Ok(())
    }

    /// Write generated text to the output. Never captured.
    pub fn emit(&mut self, s: &str) -> Result<()> {
        self.out.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Consume the context and hand back the output writer.
    pub fn into_output(self) -> W {
        self.out
    }

    // ------------------------------------------------------------------
    // Embed capture
    // ------------------------------------------------------------------

    pub fn start_capture(&mut self) {
        self.capturing = true;
    }

    pub fn stop_capture(&mut self) {
        self.capturing = false;
    }

    pub fn capturing(&self) -> bool {
        self.capturing
    }

    /// Append text to the embed buffer directly (closing newline).
    pub fn capture_push(&mut self, s: &str) {
        self.embed.push_str(s);
    }

    /// Everything captured so far. Accumulates across the whole file so a
    /// kernel can splice helpers embedded anywhere before it.
    pub fn embed_src(&self) -> &str {
        &self.embed
    }

    // ------------------------------------------------------------------
    // Whitespace and comments
    // ------------------------------------------------------------------

    /// Echo upcoming whitespace. Emitted output preserves formatting, so
    /// skipping means copying through, not discarding.
    pub fn skip_space(&mut self) -> Result<()> {
        while matches!(self.peek()?, Some(c) if c.is_ascii_whitespace()) {
            self.put()?;
        }
        Ok(())
    }

    /// Accumulate upcoming whitespace into `buf` instead of the output.
    pub fn skip_space_into(&mut self, buf: &mut String) -> Result<()> {
        while matches!(self.peek()?, Some(c) if c.is_ascii_whitespace()) {
            if let Some(c) = self.bump()? {
                buf.push(c as char);
            }
        }
        Ok(())
    }

    /// Discard upcoming whitespace (lines still counted by the cursor).
    pub fn drop_space(&mut self) -> Result<()> {
        while matches!(self.peek()?, Some(c) if c.is_ascii_whitespace()) {
            self.bump()?;
        }
        Ok(())
    }

    /// True if the next two bytes open a `//` or `/* */` comment.
    pub fn at_comment(&mut self) -> Result<bool> {
        if self.peek()? != Some(b'/') {
            return Ok(false);
        }
        Ok(matches!(self.peek_at(1)?, Some(b'/') | Some(b'*')))
    }

    /// Copy one whole comment through (bytes echoed and captured, newlines
    /// counted). Reaching end of input inside a block comment is an
    /// unterminated-construct failure.
    pub fn copy_comment(&mut self) -> Result<()> {
        self.put()?; // '/'
        if self.put()? == b'/' {
            // line comment: everything up to (not including) the newline
            while matches!(self.peek()?, Some(c) if c != b'\n') {
                self.put()?;
            }
            return Ok(());
        }
        // block comment
        loop {
            match self.peek()? {
                None => return Err(self.err("unterminated block comment").into()),
                Some(b'*') if self.peek_at(1)? == Some(b'/') => {
                    self.put()?;
                    self.put()?;
                    return Ok(());
                }
                _ => {
                    self.put()?;
                }
            }
        }
    }

    /// Echo whitespace and comments until the next significant byte.
    pub fn next_token(&mut self) -> Result<()> {
        loop {
            self.skip_space()?;
            if self.at_comment()? {
                self.copy_comment()?;
            } else {
                return Ok(());
            }
        }
    }

    // ------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------

    pub fn at_id_start(&mut self) -> Result<bool> {
        Ok(matches!(self.peek()?, Some(c) if is_id_start(c)))
    }

    /// Read an identifier. Consumed, not echoed; callers decide how the
    /// text reaches the output.
    pub fn read_id(&mut self) -> Result<String> {
        match self.peek()? {
            Some(c) if is_id_start(c) => {}
            _ => return Err(self.err("expected identifier").into()),
        }
        let mut id = String::new();
        while matches!(self.peek()?, Some(c) if is_id_char(c)) {
            if let Some(c) = self.bump()? {
                id.push(c as char);
            }
        }
        Ok(id)
    }

    /// Read a decimal integer literal with overflow checking. Consumed,
    /// not echoed.
    pub fn read_int(&mut self) -> Result<i64> {
        if !matches!(self.peek()?, Some(c) if c.is_ascii_digit()) {
            return Err(self.err("expected integer literal").into());
        }
        let mut value: i64 = 0;
        while let Some(c) = self.peek()? {
            if !c.is_ascii_digit() {
                break;
            }
            self.bump()?;
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add((c - b'0') as i64))
                .ok_or_else(|| self.err("integer literal out of range"))?;
        }
        Ok(value)
    }

    /// Consume one expected byte and echo it.
    pub fn expect_put(&mut self, c: u8, what: &str) -> Result<()> {
        if self.peek()? != Some(c) {
            return Err(self.err(what).into());
        }
        self.put()?;
        Ok(())
    }

    /// Consume one expected byte without echoing it.
    pub fn expect_drop(&mut self, c: u8, what: &str) -> Result<()> {
        if self.peek()? != Some(c) {
            return Err(self.err(what).into());
        }
        self.bump()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Translation-unit preamble
    // ------------------------------------------------------------------

    /// Emit the host-side includes, the hash/bit-cast support source and a
    /// `#line` directive, once, at the first directive. Directive-free
    /// input therefore passes through byte-for-byte.
    pub fn emit_preamble(&mut self) -> Result<()> {
        if self.preamble_done {
            return Ok(());
        }
        self.preamble_done = true;
        let line = self.line();
        let file = self.file.clone();
        self.emit("#include <cstdint>\n")?;
        self.emit("#include <cstring>\n")?;
        self.emit("#include <cassert>\n")?;
        self.emit("#include <mutex>\n")?;
        self.emit("#include <unordered_map>\n")?;
        self.emit("#include \"general/kernel.hpp\"\n")?;
        self.emit(hash::CXX_SUPPORT)?;
        self.emit(&format!("#line {} \"{}\"\n", line, file))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn ctx(input: &str) -> ParseContext<&[u8], Vec<u8>> {
        ParseContext::new(input.as_bytes(), Vec::new(), "test.cpp")
    }

    #[test]
    fn test_put_echoes_and_counts_lines() {
        let mut c = ctx("x\ny");
        c.put().unwrap();
        c.put().unwrap();
        assert_eq!(c.line(), 2);
    }

    #[test]
    fn test_capture_lockstep() {
        let mut c = ctx("abc");
        c.put().unwrap();
        c.start_capture();
        c.put().unwrap();
        c.echo("Z").unwrap();
        c.emit("E").unwrap();
        c.stop_capture();
        c.put().unwrap();
        assert_eq!(c.embed_src(), "bZ");
    }

    #[test]
    fn test_line_comment_copied() {
        let mut c = ctx("// hi\nrest");
        c.copy_comment().unwrap();
        assert_eq!(c.peek().unwrap(), Some(b'\n'));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let mut c = ctx("/* nope");
        assert!(c.copy_comment().is_err());
    }

    #[test]
    fn test_read_int_overflow() {
        let mut c = ctx("99999999999999999999");
        assert!(c.read_int().is_err());
    }

    #[test]
    fn test_read_id_rejects_digit_start() {
        let mut c = ctx("1abc");
        assert!(c.read_id().is_err());
    }
}
