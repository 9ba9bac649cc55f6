//! Normalized text and the offset map back to source structure.
//!
//! Every decoder produces a [`NormalizedText`]: one UTF-8 string plus an
//! [`OffsetMap`] recording, for each range of the string, where it came from in
//! the source container (a line, a paragraph, a spreadsheet cell, ...).
//!
//! Offsets are byte offsets into the normalized string and always fall on char
//! boundaries. Use [`char_range`] when a consumer counts characters instead.

use crate::format::Format;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Location of a piece of normalized text in the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Origin {
    /// Line of a text-like source (0-based)
    Line {
        /// Line number
        line: usize,
    },
    /// Paragraph of a word-processor body (0-based)
    Paragraph {
        /// Paragraph index in body order
        index: usize,
    },
    /// Table row inside a word-processor body
    TableRow {
        /// Table index in body order
        table: usize,
        /// Row index inside the table
        row: usize,
    },
    /// Spreadsheet cell (absolute coordinates, 0-based)
    Cell {
        /// Sheet index
        sheet: usize,
        /// Row
        row: u32,
        /// Column
        col: u32,
    },
    /// Name line emitted before each sheet's rows
    SheetName {
        /// Sheet index
        sheet: usize,
    },
    /// CSV record (0-based, after multi-line fields are joined)
    Record {
        /// Record index
        row: usize,
    },
    /// JSON value located by a JSON pointer
    JsonPath {
        /// RFC 6901 pointer
        pointer: String,
    },
    /// Block-level element of an HTML document
    Block {
        /// Block index in document order
        index: usize,
    },
}

/// One contiguous range of normalized text with a single origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Byte range in normalized text
    pub range: Range<usize>,
    /// Where the range came from
    pub origin: Origin,
}

/// Sorted, non-overlapping segments covering the normalized text, plus the
/// origin of every line.
///
/// Line origins are keyed by line number rather than byte offset, so they stay
/// valid for any view of the text (masking rewrites spans but never line
/// breaks).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetMap {
    segments: Vec<Segment>,
    lines: Vec<Origin>,
}

impl OffsetMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// All segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the map has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn push(&mut self, range: Range<usize>, origin: Origin) {
        if let Some(last) = self.segments.last_mut() {
            // Extend the previous segment when the origin repeats
            if last.origin == origin && last.range.end == range.start {
                last.range.end = range.end;
                return;
            }
        }
        self.segments.push(Segment { range, origin });
    }

    /// Recover the source origin of a normalized index.
    ///
    /// Indices inside separators resolve to the segment that precedes them.
    pub fn lookup(&self, index: usize) -> Option<&Origin> {
        let pos = self.segments.partition_point(|s| s.range.start <= index);
        if pos == 0 {
            return None;
        }
        Some(&self.segments[pos - 1].origin)
    }

    /// Origin of the first segment overlapping `range`.
    pub fn lookup_range(&self, range: Range<usize>) -> Option<&Origin> {
        self.segments
            .iter()
            .find(|s| s.range.start < range.end.max(range.start + 1) && range.start < s.range.end)
            .map(|s| &s.origin)
            .or_else(|| self.lookup(range.start))
    }

    /// Origin of every line, in line order.
    pub fn line_origins(&self) -> &[Origin] {
        &self.lines
    }

    /// Origin of line `line` (0-based).
    pub fn line_origin(&self, line: usize) -> Option<&Origin> {
        self.lines.get(line)
    }
}

/// Text extracted by a decoder, with provenance and warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedText {
    /// Normalized UTF-8 text (LF line endings)
    pub text: String,
    /// Map from text ranges to source locations
    pub offset_map: OffsetMap,
    /// Format the text was decoded from
    pub format: Format,
    /// Non-fatal problems (partial extraction, encoding fallbacks, ...)
    pub warnings: Vec<String>,
    /// Page count, when the container records one
    pub page_count: Option<u32>,
}

impl NormalizedText {
    /// Recover the source origin of a normalized index.
    pub fn origin_of(&self, index: usize) -> Option<&Origin> {
        self.offset_map.lookup(index)
    }

    /// Number of characters (not bytes) of text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether extraction produced any non-whitespace text.
    pub fn has_content(&self) -> bool {
        self.text.chars().any(|c| !c.is_whitespace())
    }
}

/// Incremental builder used by every decoder.
///
/// Lines are appended one at a time with their origin; the builder inserts the
/// `\n` separators and keeps the offset map in sync.
#[derive(Debug)]
pub struct TextBuilder {
    format: Format,
    text: String,
    map: OffsetMap,
    warnings: Vec<String>,
    page_count: Option<u32>,
    lines: usize,
}

impl TextBuilder {
    /// Start building text for `format`.
    pub fn new(format: Format) -> Self {
        Self {
            format,
            text: String::new(),
            map: OffsetMap::new(),
            warnings: Vec::new(),
            page_count: None,
            lines: 0,
        }
    }

    /// Append one line of text attributed to `origin`.
    ///
    /// Embedded `\r` characters are dropped; embedded `\n` characters start new
    /// lines with the same origin.
    pub fn push_line(&mut self, line: &str, origin: Origin) {
        for piece in line.split('\n') {
            if self.lines > 0 {
                self.text.push('\n');
            }
            let start = self.text.len();
            self.text.extend(piece.chars().filter(|c| *c != '\r' && *c != '\0'));
            let end = self.text.len();
            // Zero-width segments still anchor empty lines for export
            self.map.push(start..end.max(start), origin.clone());
            self.map.lines.push(origin.clone());
            self.lines += 1;
        }
    }

    /// Record a non-fatal problem.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}: {}", self.format, message);
        self.warnings.push(message);
    }

    /// Record the page count reported by the container.
    pub fn set_page_count(&mut self, pages: Option<u32>) {
        self.page_count = pages;
    }

    /// Number of lines pushed so far.
    pub fn line_count(&self) -> usize {
        self.lines
    }

    /// Drop trailing empty lines (containers often end with blank paragraphs).
    pub fn trim_trailing_blank_lines(&mut self) {
        while self.lines > 0 && self.text.ends_with('\n') {
            let cut = self.text.len() - 1;
            self.text.truncate(cut);
            self.lines -= 1;
            self.map.lines.pop();
            while let Some(last) = self.map.segments.last() {
                if last.range.start > cut || (last.range.start == cut && last.range.is_empty()) {
                    self.map.segments.pop();
                } else {
                    break;
                }
            }
            if let Some(last) = self.map.segments.last_mut() {
                last.range.end = last.range.end.min(cut);
            }
        }
        if self.lines == 1 && self.text.is_empty() {
            self.lines = 0;
            self.map.segments.clear();
            self.map.lines.clear();
        }
    }

    /// Finish and return the normalized text.
    pub fn finish(self) -> NormalizedText {
        NormalizedText {
            text: self.text,
            offset_map: self.map,
            format: self.format,
            warnings: self.warnings,
            page_count: self.page_count,
        }
    }
}

/// Convert a byte range of `text` into a char range.
///
/// Offsets past the end clamp to `text.len()`; offsets inside a character
/// round down to its first byte.
pub fn char_range(text: &str, range: Range<usize>) -> Range<usize> {
    let start_byte = floor_boundary(text, range.start);
    let end_byte = floor_boundary(text, range.end).max(start_byte);
    let start = text[..start_byte].chars().count();
    let len = text[start_byte..end_byte].chars().count();
    start..start + len
}

fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Byte offset of the `char_index`-th character (or `text.len()` past the end).
pub fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NormalizedText {
        let mut b = TextBuilder::new(Format::PlainText);
        b.push_line("first", Origin::Line { line: 0 });
        b.push_line("", Origin::Line { line: 1 });
        b.push_line("third", Origin::Line { line: 2 });
        b.finish()
    }

    #[test]
    fn test_builder_joins_lines() {
        let t = sample();
        assert_eq!(t.text, "first\n\nthird");
        assert_eq!(t.offset_map.len(), 3);
    }

    #[test]
    fn test_lookup() {
        let t = sample();
        assert_eq!(t.origin_of(0), Some(&Origin::Line { line: 0 }));
        assert_eq!(t.origin_of(4), Some(&Origin::Line { line: 0 }));
        assert_eq!(t.origin_of(8), Some(&Origin::Line { line: 2 }));
    }

    #[test]
    fn test_line_origins_include_empty_lines() {
        let t = sample();
        assert_eq!(
            t.offset_map.line_origins(),
            &[
                Origin::Line { line: 0 },
                Origin::Line { line: 1 },
                Origin::Line { line: 2 },
            ]
        );
    }

    #[test]
    fn test_embedded_newline_keeps_origin() {
        let mut b = TextBuilder::new(Format::Docx);
        b.push_line("a\nb", Origin::Paragraph { index: 4 });
        let t = b.finish();
        assert_eq!(t.text, "a\nb");
        assert_eq!(t.origin_of(2), Some(&Origin::Paragraph { index: 4 }));
    }

    #[test]
    fn test_trim_trailing_blank_lines() {
        let mut b = TextBuilder::new(Format::Docx);
        b.push_line("body", Origin::Paragraph { index: 0 });
        b.push_line("", Origin::Paragraph { index: 1 });
        b.push_line("", Origin::Paragraph { index: 2 });
        b.trim_trailing_blank_lines();
        assert_eq!(b.line_count(), 1);
        let t = b.finish();
        assert_eq!(t.text, "body");
        assert_eq!(t.offset_map.len(), 1);
        assert_eq!(t.offset_map.line_origins().len(), 1);
    }

    #[test]
    fn test_char_range_inside_char() {
        let text = "山田 taro";
        // Byte 1 is inside 山, byte 4 inside 田
        assert_eq!(char_range(text, 1..4), 0..1);
        assert_eq!(char_range(text, 4..100), 1..7);
        assert_eq!(char_range(text, 5..2), 1..1);
    }

    #[test]
    fn test_char_range_multibyte() {
        let text = "氏名 山田";
        let start = text.find('山').unwrap();
        assert_eq!(char_range(text, start..text.len()), 3..5);
        assert_eq!(byte_offset(text, 3), start);
    }
}
