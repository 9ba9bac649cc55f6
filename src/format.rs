//! Document format identifiers and sniffing.
//!
//! The ten decodable formats are listed in [`Format::ALL`]. When a caller does
//! not know the format, [`Format::sniff`] inspects magic bytes, container
//! entries, and finally the file extension.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;

/// Decodable input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// Plain text in any supported encoding
    PlainText,
    /// Markdown source
    Markdown,
    /// HTML document or fragment
    Html,
    /// Rich Text Format
    Rtf,
    /// Comma/semicolon/tab separated values
    Csv,
    /// JSON document
    Json,
    /// XLSX, XLS, or ODS workbook
    Spreadsheet,
    /// Legacy Word 97-2003 binary document (.doc)
    LegacyWord,
    /// Office Open XML word-processing document (.docx)
    Docx,
    /// OpenDocument text (.odt)
    Odt,
}

impl Format {
    /// Every decodable format, in dispatch-table order.
    pub const ALL: [Format; 10] = [
        Format::PlainText,
        Format::Markdown,
        Format::Html,
        Format::Rtf,
        Format::Csv,
        Format::Json,
        Format::Spreadsheet,
        Format::LegacyWord,
        Format::Docx,
        Format::Odt,
    ];

    /// Stable short identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Format::PlainText => "txt",
            Format::Markdown => "md",
            Format::Html => "html",
            Format::Rtf => "rtf",
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Spreadsheet => "spreadsheet",
            Format::LegacyWord => "doc",
            Format::Docx => "docx",
            Format::Odt => "odt",
        }
    }

    /// Parse an identifier or file extension.
    pub fn from_id(id: &str) -> Option<Format> {
        let id = id.trim().trim_start_matches('.');
        Format::ALL
            .into_iter()
            .find(|f| f.id().eq_ignore_ascii_case(id))
            .or_else(|| Format::from_extension(id))
    }

    /// Whether the format is a binary container (ZIP or OLE archive).
    pub fn is_container(&self) -> bool {
        matches!(self, Format::Spreadsheet | Format::LegacyWord | Format::Docx | Format::Odt)
    }

    /// Resolve a format from a file extension (case-insensitive, without dot).
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" | "log" => Some(Format::PlainText),
            "md" | "markdown" => Some(Format::Markdown),
            "html" | "htm" | "xhtml" => Some(Format::Html),
            "rtf" => Some(Format::Rtf),
            "csv" | "tsv" => Some(Format::Csv),
            "json" => Some(Format::Json),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(Format::Spreadsheet),
            "doc" => Some(Format::LegacyWord),
            "docx" => Some(Format::Docx),
            "odt" => Some(Format::Odt),
            _ => None,
        }
    }

    /// Resolve a format from a MIME type.
    pub fn from_mime(mime: &str) -> Option<Format> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "text/plain" => Some(Format::PlainText),
            "text/markdown" | "text/x-markdown" => Some(Format::Markdown),
            "text/html" | "application/xhtml+xml" => Some(Format::Html),
            "application/rtf" | "text/rtf" => Some(Format::Rtf),
            "text/csv" | "text/tab-separated-values" => Some(Format::Csv),
            "application/json" => Some(Format::Json),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(Format::Spreadsheet),
            "application/msword" => Some(Format::LegacyWord),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Format::Docx)
            },
            "application/vnd.oasis.opendocument.text" => Some(Format::Odt),
            _ => None,
        }
    }

    /// Sniff the format of `bytes`, using `file_name` only as a tie breaker.
    pub fn sniff(bytes: &[u8], file_name: Option<&str>) -> Format {
        let ext_hint = file_name
            .and_then(|name| name.rsplit_once('.'))
            .and_then(|(_, ext)| Format::from_extension(ext));

        if bytes.starts_with(ZIP_MAGIC) {
            if let Some(format) = sniff_zip(bytes) {
                return format;
            }
        }

        if bytes.starts_with(OLE_MAGIC) {
            // Excel streams are named "Workbook" (or "Book" in BIFF5), UTF-16LE in the directory
            if contains_utf16le(bytes, "Workbook") || ext_hint == Some(Format::Spreadsheet) {
                return Format::Spreadsheet;
            }
            return Format::LegacyWord;
        }

        let head = sniff_head(bytes);
        if head.starts_with("{\\rtf") {
            return Format::Rtf;
        }
        let lower = head.to_ascii_lowercase();
        if lower.starts_with("<!doctype html")
            || lower.starts_with("<html")
            || (lower.starts_with('<') && (lower.contains("<body") || lower.contains("<div")))
        {
            return Format::Html;
        }
        if (lower.starts_with('{') || lower.starts_with('['))
            && serde_json::from_slice::<serde_json::Value>(strip_bom(bytes)).is_ok()
        {
            return Format::Json;
        }

        match ext_hint {
            Some(format @ (Format::Markdown | Format::Csv | Format::Html | Format::Json)) => format,
            _ => Format::PlainText,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

/// First non-whitespace characters of the input, lossily decoded.
fn sniff_head(bytes: &[u8]) -> String {
    let body = strip_bom(bytes);
    let window = &body[..body.len().min(512)];
    String::from_utf8_lossy(window).trim_start().to_string()
}

fn sniff_zip(bytes: &[u8]) -> Option<Format> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).ok()?;
    let names: Vec<&str> = archive.file_names().collect();
    if names.iter().any(|n| *n == "word/document.xml") {
        return Some(Format::Docx);
    }
    if names.iter().any(|n| *n == "xl/workbook.xml" || *n == "xl/workbook.bin") {
        return Some(Format::Spreadsheet);
    }
    if names.iter().any(|n| *n == "mimetype") {
        // ODF stores the mimetype uncompressed at the start of the archive
        let text = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
        if text.contains("opendocument.text") {
            return Some(Format::Odt);
        }
        if text.contains("opendocument.spreadsheet") {
            return Some(Format::Spreadsheet);
        }
    }
    if names.iter().any(|n| *n == "content.xml") {
        return Some(Format::Odt);
    }
    None
}

fn contains_utf16le(haystack: &[u8], needle: &str) -> bool {
    let pattern: Vec<u8> = needle.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    haystack.windows(pattern.len()).any(|w| w == pattern.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_formats_unique() {
        let mut ids: Vec<&str> = Format::ALL.iter().map(|f| f.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(Format::from_extension("DOCX"), Some(Format::Docx));
        assert_eq!(Format::from_extension("ods"), Some(Format::Spreadsheet));
        assert_eq!(Format::from_extension("pdf"), None);
        assert_eq!(Format::from_id("spreadsheet"), Some(Format::Spreadsheet));
        assert_eq!(Format::from_id(".md"), Some(Format::Markdown));
        for format in Format::ALL {
            assert_eq!(Format::from_id(format.id()), Some(format));
        }
    }

    #[test]
    fn test_from_mime() {
        assert_eq!(Format::from_mime("text/html; charset=utf-8"), Some(Format::Html));
        assert_eq!(Format::from_mime("application/msword"), Some(Format::LegacyWord));
    }

    #[test]
    fn test_sniff_text_formats() {
        assert_eq!(Format::sniff(b"{\\rtf1\\ansi hello}", None), Format::Rtf);
        assert_eq!(Format::sniff(b"<!DOCTYPE html><html></html>", None), Format::Html);
        assert_eq!(Format::sniff(b"{\"name\": \"x\"}", None), Format::Json);
        assert_eq!(Format::sniff(b"a,b\n1,2\n", Some("x.csv")), Format::Csv);
        assert_eq!(Format::sniff(b"# Title\n", Some("cv.md")), Format::Markdown);
        assert_eq!(Format::sniff(b"just text", None), Format::PlainText);
    }

    #[test]
    fn test_sniff_ole() {
        let mut bytes = OLE_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        assert_eq!(Format::sniff(&bytes, None), Format::LegacyWord);
        assert_eq!(Format::sniff(&bytes, Some("book.xls")), Format::Spreadsheet);
    }

    #[test]
    fn test_display() {
        assert_eq!(Format::LegacyWord.to_string(), "doc");
    }
}
