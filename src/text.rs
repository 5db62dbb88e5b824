//! Text positions, ranges and edits.
//!
//! Sentences are stored with byte offsets into the raw text. Editors talk in lines and columns,
//! so this module converts between the two. Lines are separated by `\n`; a column counts Unicode
//! scalar values from the start of its line.

use crate::error::{Error, Result};

/// A zero-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    /// Line number.
    pub line: usize,
    /// Column, in Unicode scalar values.
    pub character: usize,
}

impl Position {
    /// Create a new position.
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// A half-open line/column range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range {
    /// Inclusive start.
    pub start: Position,
    /// Exclusive end.
    pub end: Position,
}

impl Range {
    /// Create a new range.
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// A byte span `[start, stop)` of the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive stop offset.
    pub stop: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }
}

/// A replacement of the byte range `[start, end)` by `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextEdit {
    /// Start offset of the replaced range.
    pub start: usize,
    /// End offset of the replaced range.
    pub end: usize,
    /// Replacement text.
    pub text: String,
}

impl TextEdit {
    /// Create a new edit from byte offsets.
    pub fn new(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Create an edit from a line/column range over `text`.
    pub fn from_range(text: &str, range: Range, replacement: impl Into<String>) -> Result<Self> {
        Ok(Self {
            start: offset_of(text, range.start)?,
            end: offset_of(text, range.end)?,
            text: replacement.into(),
        })
    }

    /// Check that the edit can be applied to `text`.
    pub(crate) fn check(&self, text: &str) -> Result<()> {
        if self.start > self.end
            || self.end > text.len()
            || !text.is_char_boundary(self.start)
            || !text.is_char_boundary(self.end)
        {
            return Err(Error::InvalidEdit {
                start: self.start,
                end: self.end,
                len: text.len(),
            });
        }
        Ok(())
    }
}

/// Convert a byte offset to a position.
///
/// Offsets past the end of the text clamp to the end position.
pub fn position_of(text: &str, offset: usize) -> Position {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &text[..offset];
    let line = before.matches('\n').count();
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    Position {
        line,
        character: before[line_start..].chars().count(),
    }
}

/// Convert a position to a byte offset.
///
/// A column past the end of its line clamps to the end of that line, like editors do.
pub fn offset_of(text: &str, position: Position) -> Result<usize> {
    let mut line_start = 0;
    for _ in 0..position.line {
        match text[line_start..].find('\n') {
            Some(i) => line_start += i + 1,
            None => return Err(Error::InvalidPosition(position)),
        }
    }
    let line = &text[line_start..];
    let line = &line[..line.find('\n').unwrap_or(line.len())];
    let column = line
        .char_indices()
        .nth(position.character)
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    Ok(line_start + column)
}

/// Convert a span to a range.
pub fn range_of_span(text: &str, span: Span) -> Range {
    Range {
        start: position_of(text, span.start),
        end: position_of(text, span.stop),
    }
}
