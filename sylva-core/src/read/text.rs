//! Byte cursor shared by the plain-text dialect readers.
//!
//! The cursor slurps the whole input up front, keeps a line index for
//! locations, and exposes the small set of primitives the dialects build
//! their token rules from. Extraction helpers return owned strings; the
//! dialects resolve and unescape tokens anyway, so borrowing buys nothing
//! here.
//!
//! Byte-wise methods are safe on UTF-8 input because every delimiter the
//! dialects use is ASCII; multi-byte characters never match a delimiter,
//! so slices always fall on character boundaries.

use std::io::Read;

use memchr::memchr;

use crate::error::{Error, Result};
use crate::span::{LineIndex, Location};

pub struct Cursor {
    buf: String,
    pos: usize,
    lines: LineIndex,
}

impl Cursor {
    pub fn new(text: impl Into<String>) -> Cursor {
        let buf = text.into();
        let lines = LineIndex::new(buf.as_bytes());
        Cursor { buf, pos: 0, lines }
    }

    /// Slurp a byte source; the input must be UTF-8.
    pub fn from_reader(mut reader: impl Read) -> Result<Cursor> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let buf = String::from_utf8(bytes)
            .map_err(|_| Error::parse("input is not valid UTF-8", None))?;
        Ok(Cursor::new(buf))
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn location(&self) -> Location {
        self.lines.locate(self.pos)
    }

    pub fn location_at(&self, offset: usize) -> Location {
        self.lines.locate(offset)
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.buf.as_bytes().get(self.pos).copied()
    }

    #[inline]
    pub fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.buf.as_bytes().get(self.pos + ahead).copied()
    }

    pub fn peek_char(&self) -> Option<char> {
        self.buf[self.pos.min(self.buf.len())..].chars().next()
    }

    /// Advance one byte. Only call when the current byte is ASCII.
    #[inline]
    pub fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Advance one character.
    pub fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume the current byte when it equals `byte`.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, byte: u8) -> Result<()> {
        if self.eat(byte) {
            Ok(())
        } else {
            let found = match self.peek_char() {
                Some(c) => format!("{c:?}"),
                None => "end of input".to_string(),
            };
            Err(Error::parse_at(
                format!("expected {:?}, found {found}", byte as char),
                self.location(),
            ))
        }
    }

    /// Skip spaces and tabs.
    pub fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    /// Skip all ASCII whitespace including line breaks.
    pub fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Consume bytes while `pred` holds and return them.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if pred(b)) {
            self.pos += 1;
        }
        self.slice(start, self.pos).to_string()
    }

    /// Consume the rest of the current line without its terminator.
    pub fn take_line(&mut self) -> String {
        let rest = &self.buf.as_bytes()[self.pos..];
        let (end, next) = match memchr(b'\n', rest) {
            Some(i) => (self.pos + i, self.pos + i + 1),
            None => (self.buf.len(), self.buf.len()),
        };
        let mut line = self.slice(self.pos, end);
        if let Some(stripped) = line.strip_suffix('\r') {
            line = stripped;
        }
        let line = line.to_string();
        self.pos = next;
        line
    }

    /// Whether the input continues with `prefix` (ASCII case-insensitive).
    pub fn starts_with_ci(&self, prefix: &str) -> bool {
        self.buf.as_bytes()[self.pos..]
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
    }

    /// Consume `prefix` when the input continues with it
    /// (ASCII case-insensitive).
    pub fn eat_ci(&mut self, prefix: &str) -> bool {
        if self.starts_with_ci(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    /// Read a quoted token. The cursor must stand on the opening quote.
    /// A doubled quote inside the token stands for one literal quote.
    pub fn read_quoted(&mut self, quote: u8) -> Result<String> {
        let start = self.location();
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            match self.bump_char() {
                None => {
                    return Err(Error::parse_at("unterminated quoted token", start));
                }
                Some(c) if c as u32 == quote as u32 => {
                    if self.peek() == Some(quote) {
                        self.pos += 1;
                        out.push(c);
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    /// Read a `[...]` comment. The cursor must stand on the opening
    /// bracket. With `nested` set, inner brackets must balance.
    pub fn read_bracketed(&mut self, nested: bool) -> Result<String> {
        let start = self.location();
        self.expect(b'[')?;
        let mut depth = 1usize;
        let mut out = String::new();
        loop {
            match self.bump_char() {
                None => return Err(Error::parse_at("unterminated comment", start)),
                Some('[') if nested => {
                    depth += 1;
                    out.push('[');
                }
                Some(']') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(']');
                }
                Some(c) => out.push(c),
            }
        }
    }

    #[inline]
    fn slice(&self, start: usize, end: usize) -> &str {
        self.buf.get(start..end).unwrap_or("")
    }
}
