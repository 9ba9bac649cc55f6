//! Format decoders.
//!
//! This module provides one adapter per input format, each producing a
//! [`NormalizedText`] with an offset map back to the source:
//! - Plain text and Markdown (line origins)
//! - HTML (block origins, scripts/styles dropped)
//! - RTF (paragraph origins, code-page aware)
//! - CSV (record origins, delimiter sniffing)
//! - JSON (JSON-pointer origins)
//! - Spreadsheets: XLSX/XLS/ODS (cell origins)
//! - Word: DOCX (paragraph/table-row origins) and legacy DOC (heuristic)
//! - OpenDocument text (paragraph/table-row origins)
//!
//! Dispatch is an exhaustive `match` over [`Format`], so adding a format
//! without an adapter does not compile.

use crate::error::{DecodeError, DecodeErrorKind};
use crate::format::Format;
use crate::offset::NormalizedText;
use std::io::{Read, Seek};

mod csv;
mod docx;
pub mod encoding;
mod html;
mod json;
mod legacy_doc;
mod odt;
mod rtf;
mod spreadsheet;
mod text;

pub use csv::CsvDecoder;
pub use docx::DocxDecoder;
pub use html::{html_to_text, HtmlDecoder};
pub use json::JsonDecoder;
pub use legacy_doc::LegacyWordDecoder;
pub use odt::OdtDecoder;
pub use rtf::RtfDecoder;
pub use spreadsheet::SpreadsheetDecoder;
pub use text::{MarkdownDecoder, PlainTextDecoder};

/// Result type for decoders.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Security limits applied while decoding (decompression bomb protection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DecodeLimits {
    /// Maximum size of the input document in bytes
    pub max_input_bytes: usize,
    /// Maximum decompressed size of a single container entry
    pub max_entry_bytes: usize,
    /// Maximum decompressed:compressed ratio of a container entry
    pub max_decompression_ratio: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: 20 * 1024 * 1024,
            max_entry_bytes: 64 * 1024 * 1024,
            max_decompression_ratio: 100,
        }
    }
}

/// Trait for format adapters.
pub trait Decoder: Send + Sync {
    /// Format this adapter handles.
    fn format(&self) -> Format;

    /// Decode `bytes` into normalized text.
    fn decode(&self, bytes: &[u8], limits: &DecodeLimits) -> DecodeResult<NormalizedText>;
}

/// Look up the adapter for `format`.
pub fn decoder_for(format: Format) -> &'static dyn Decoder {
    match format {
        Format::PlainText => &PlainTextDecoder,
        Format::Markdown => &MarkdownDecoder,
        Format::Html => &HtmlDecoder,
        Format::Rtf => &RtfDecoder,
        Format::Csv => &CsvDecoder,
        Format::Json => &JsonDecoder,
        Format::Spreadsheet => &SpreadsheetDecoder,
        Format::LegacyWord => &LegacyWordDecoder,
        Format::Docx => &DocxDecoder,
        Format::Odt => &OdtDecoder,
    }
}

/// Decode `bytes` with the adapter for `format`, enforcing the input size limit
/// and rejecting results without any text.
///
/// # Examples
///
/// ```
/// use careermask::decoders::{decode, DecodeLimits};
/// use careermask::format::Format;
///
/// let text = decode(b"Name: Taro\r\nRole: Engineer", Format::PlainText, &DecodeLimits::default()).unwrap();
/// assert_eq!(text.text, "Name: Taro\nRole: Engineer");
/// ```
pub fn decode(bytes: &[u8], format: Format, limits: &DecodeLimits) -> DecodeResult<NormalizedText> {
    if limits.max_input_bytes > 0 && bytes.len() > limits.max_input_bytes {
        return Err(DecodeError::size_exceeded(format, bytes.len(), limits.max_input_bytes));
    }
    if bytes.is_empty() {
        return Err(DecodeError::empty(format));
    }

    let decoder = decoder_for(format);
    let normalized = decoder.decode(bytes, limits)?;
    if !normalized.has_content() {
        return Err(DecodeError::empty(format));
    }
    log::debug!(
        "Decoded {} document: {} chars, {} segments, {} warnings",
        format,
        normalized.char_count(),
        normalized.offset_map.len(),
        normalized.warnings.len()
    );
    Ok(normalized)
}

/// Read a named entry of a ZIP container with size and ratio limits.
///
/// Returns `Ok(None)` when the entry does not exist.
pub(crate) fn read_zip_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
    format: Format,
    limits: &DecodeLimits,
) -> DecodeResult<Option<String>> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(zip::result::ZipError::UnsupportedArchive(msg)) => {
            return Err(DecodeError::unsupported(format, format!("{}: {}", name, msg)))
        },
        Err(e) => return Err(DecodeError::corrupt(format, format!("{}: {}", name, e))),
    };

    let declared = file.size() as usize;
    let compressed = (file.compressed_size() as usize).max(1);

    // SECURITY: refuse decompression bombs before inflating
    if limits.max_entry_bytes > 0 && declared > limits.max_entry_bytes {
        return Err(DecodeError::size_exceeded(format, declared, limits.max_entry_bytes));
    }
    if limits.max_decompression_ratio > 0
        && declared / compressed > limits.max_decompression_ratio as usize
        && declared > 1024 * 1024
    {
        return Err(DecodeError::new(
            DecodeErrorKind::SizeExceeded,
            format,
            format!(
                "{}: decompression ratio {}:1 exceeds limit {}:1",
                name,
                declared / compressed,
                limits.max_decompression_ratio
            ),
        ));
    }

    // Declared sizes can lie, so cap the actual read too
    let cap = if limits.max_entry_bytes > 0 {
        limits.max_entry_bytes as u64 + 1
    } else {
        u64::MAX
    };
    let mut raw = Vec::with_capacity(declared.min(1 << 20));
    file.take(cap)
        .read_to_end(&mut raw)
        .map_err(|e| DecodeError::corrupt(format, format!("{}: {}", name, e)))?;
    if limits.max_entry_bytes > 0 && raw.len() > limits.max_entry_bytes {
        return Err(DecodeError::size_exceeded(format, raw.len(), limits.max_entry_bytes));
    }

    let (text, _) = encoding::decode_bytes(&raw);
    Ok(Some(text))
}

/// Open a ZIP container, mapping failures to decode errors.
pub(crate) fn open_zip(bytes: &[u8], format: Format) -> DecodeResult<zip::ZipArchive<std::io::Cursor<&[u8]>>> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| match e {
        zip::result::ZipError::UnsupportedArchive(msg) => {
            DecodeError::unsupported(format, format!("unsupported archive: {}", msg))
        },
        other => DecodeError::corrupt(format, format!("failed to open archive: {}", other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_table_is_complete() {
        for format in Format::ALL {
            assert_eq!(decoder_for(format).format(), format, "adapter mismatch for {}", format);
        }
    }

    #[test]
    fn test_all_lists_every_variant() {
        // A new variant makes this match non-exhaustive until ALL is updated
        fn position(f: Format) -> usize {
            match f {
                Format::PlainText => 0,
                Format::Markdown => 1,
                Format::Html => 2,
                Format::Rtf => 3,
                Format::Csv => 4,
                Format::Json => 5,
                Format::Spreadsheet => 6,
                Format::LegacyWord => 7,
                Format::Docx => 8,
                Format::Odt => 9,
            }
        }
        for (i, f) in Format::ALL.iter().enumerate() {
            assert_eq!(position(*f), i);
        }
    }

    #[test]
    fn test_size_limit() {
        let limits = DecodeLimits {
            max_input_bytes: 4,
            ..Default::default()
        };
        let err = decode(b"too large", Format::PlainText, &limits).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::SizeExceeded);
    }

    #[test]
    fn test_empty_input() {
        let err = decode(b"", Format::PlainText, &DecodeLimits::default()).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::EmptyContent);
        let err = decode(b"  \n\t", Format::PlainText, &DecodeLimits::default()).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::EmptyContent);
    }
}
