//! Plain text and Markdown decoders.
//!
//! Both keep the source text verbatim (after encoding normalisation); each
//! line maps back to its source line number.

use super::encoding::decode_text;
use super::{DecodeLimits, DecodeResult, Decoder};
use crate::format::Format;
use crate::offset::{NormalizedText, Origin, TextBuilder};

/// Plain text decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextDecoder;

/// Markdown decoder. Markup characters are kept: list markers and headings
/// already sit on their own lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownDecoder;

fn decode_lines(bytes: &[u8], format: Format) -> NormalizedText {
    let (text, warning) = decode_text(bytes);
    let mut builder = TextBuilder::new(format);
    if let Some(warning) = warning {
        builder.warn(warning);
    }
    for (line, content) in text.split('\n').enumerate() {
        builder.push_line(content, Origin::Line { line });
    }
    builder.trim_trailing_blank_lines();
    builder.finish()
}

impl Decoder for PlainTextDecoder {
    fn format(&self) -> Format {
        Format::PlainText
    }

    fn decode(&self, bytes: &[u8], _limits: &DecodeLimits) -> DecodeResult<NormalizedText> {
        Ok(decode_lines(bytes, Format::PlainText))
    }
}

impl Decoder for MarkdownDecoder {
    fn format(&self) -> Format {
        Format::Markdown
    }

    fn decode(&self, bytes: &[u8], _limits: &DecodeLimits) -> DecodeResult<NormalizedText> {
        Ok(decode_lines(bytes, Format::Markdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_lines() {
        let t = PlainTextDecoder
            .decode(b"line one\r\nline two\n\n", &DecodeLimits::default())
            .unwrap();
        assert_eq!(t.text, "line one\nline two");
        assert_eq!(t.origin_of(10), Some(&Origin::Line { line: 1 }));
    }

    #[test]
    fn test_markdown_keeps_markers() {
        let t = MarkdownDecoder
            .decode(b"# Profile\n- Tokyo\n", &DecodeLimits::default())
            .unwrap();
        assert_eq!(t.text, "# Profile\n- Tokyo");
        assert_eq!(t.format, Format::Markdown);
    }

    #[test]
    fn test_encoding_warning_attached() {
        let t = PlainTextDecoder
            .decode(b"caf\xE9", &DecodeLimits::default())
            .unwrap();
        assert_eq!(t.text, "caf\u{e9}");
        assert_eq!(t.warnings.len(), 1);
    }
}
