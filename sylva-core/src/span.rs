//! Source locations for diagnostics.
//!
//! Readers track byte offsets while scanning. Line and column are derived
//! from a newline index built once per buffer, so the scanning hot path
//! never counts lines.

use std::fmt;

use memchr::memchr_iter;

/// A position in a source document.
///
/// `offset` is a 0-based byte offset, `line` and `column` are 1-based.
/// Column counts bytes, not grapheme clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(offset: usize, line: u32, column: u32) -> Self {
        Location { offset, line, column }
    }

    /// The first position of any document.
    pub fn start() -> Self {
        Location { offset: 0, line: 1, column: 1 }
    }

    /// A position known only by byte offset.
    ///
    /// Streaming XML input does not track lines; line and column are set
    /// to 0, standing for unknown, and `Display` shows just the offset.
    pub fn at_offset(offset: usize) -> Self {
        Location { offset, line: 0, column: 0 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            return write!(f, "offset {}", self.offset);
        }
        write!(
            f,
            "line {}, column {} (offset {})",
            self.line, self.column, self.offset
        )
    }
}

/// Maps byte offsets to line/column positions.
///
/// Built eagerly from the input buffer with one `memchr` sweep; lookups
/// binary-search the recorded line starts.
#[derive(Debug)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(src: &[u8]) -> Self {
        let mut line_starts = Vec::with_capacity(16);
        line_starts.push(0);
        for nl in memchr_iter(b'\n', src) {
            line_starts.push(nl + 1);
        }
        LineIndex { line_starts }
    }

    pub fn locate(&self, offset: usize) -> Location {
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        Location {
            offset,
            line: (line + 1) as u32,
            column: (offset - self.line_starts[line] + 1) as u32,
        }
    }
}
