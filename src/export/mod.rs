//! Exporters for the active view.
//!
//! Every exporter takes the view text plus the decoder's [`OffsetMap`] and
//! serializes to one target format. Line *i* of any masked view corresponds to
//! line *i* of the decoded text, so exporters read the per-line origins to
//! rebuild sheets, table rows, and paragraphs. Lines without an origin (an AI
//! rewrite longer than the source) are written as plain paragraphs or rows.
//!
//! Container targets are written as a minimal skeleton (content types,
//! relationships, one body part): structure is approximated, text is exact.

mod csv;
mod docx;
mod pdf;
mod text;
mod xlsx;

pub use csv::CsvExporter;
pub use docx::DocxExporter;
pub use pdf::{PdfExporter, PdfWriter, PdfWriterConfig};
pub use text::{MarkdownExporter, PlainTextExporter};
pub use xlsx::XlsxExporter;

use crate::error::{Error, Result};
use crate::format::Format;
use crate::offset::{OffsetMap, Origin};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportTarget {
    /// UTF-8 text
    PlainText,
    /// Markdown
    Markdown,
    /// RFC 4180 CSV
    Csv,
    /// Office Open XML workbook
    Xlsx,
    /// Office Open XML document
    Docx,
    /// Paginated fixed layout
    Pdf,
}

impl ExportTarget {
    /// Every target.
    pub const ALL: [ExportTarget; 6] = [
        ExportTarget::PlainText,
        ExportTarget::Markdown,
        ExportTarget::Csv,
        ExportTarget::Xlsx,
        ExportTarget::Docx,
        ExportTarget::Pdf,
    ];

    /// Stable identifier.
    pub fn id(&self) -> &'static str {
        match self {
            ExportTarget::PlainText => "text",
            ExportTarget::Markdown => "markdown",
            ExportTarget::Csv => "csv",
            ExportTarget::Xlsx => "xlsx",
            ExportTarget::Docx => "docx",
            ExportTarget::Pdf => "pdf",
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportTarget::PlainText => "txt",
            ExportTarget::Markdown => "md",
            ExportTarget::Csv => "csv",
            ExportTarget::Xlsx => "xlsx",
            ExportTarget::Docx => "docx",
            ExportTarget::Pdf => "pdf",
        }
    }

    /// MIME type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportTarget::PlainText => "text/plain; charset=utf-8",
            ExportTarget::Markdown => "text/markdown; charset=utf-8",
            ExportTarget::Csv => "text/csv; charset=utf-8",
            ExportTarget::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportTarget::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ExportTarget::Pdf => "application/pdf",
        }
    }

    /// Parse an identifier or extension.
    pub fn from_id(id: &str) -> Option<ExportTarget> {
        let id = id.trim().trim_start_matches('.');
        ExportTarget::ALL
            .into_iter()
            .find(|t| t.id().eq_ignore_ascii_case(id) || t.extension().eq_ignore_ascii_case(id))
    }

    /// Decodable format this target reads back as, if any.
    pub fn decodes_as(&self) -> Option<Format> {
        match self {
            ExportTarget::PlainText => Some(Format::PlainText),
            ExportTarget::Markdown => Some(Format::Markdown),
            ExportTarget::Csv => Some(Format::Csv),
            ExportTarget::Xlsx => Some(Format::Spreadsheet),
            ExportTarget::Docx => Some(Format::Docx),
            ExportTarget::Pdf => None,
        }
    }

    /// Natural export target for a source format.
    pub fn for_source(format: Format) -> ExportTarget {
        match format {
            Format::Markdown => ExportTarget::Markdown,
            Format::Csv => ExportTarget::Csv,
            Format::Spreadsheet => ExportTarget::Xlsx,
            Format::Docx | Format::Odt | Format::LegacyWord | Format::Rtf => ExportTarget::Docx,
            Format::PlainText | Format::Html | Format::Json => ExportTarget::PlainText,
        }
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Serializer for one target.
pub trait Exporter: Send + Sync {
    /// Target produced.
    fn target(&self) -> ExportTarget;

    /// Serialize `text`, using `map` for structure.
    fn export(&self, text: &str, map: &OffsetMap) -> Result<Vec<u8>>;
}

/// Look up the exporter for `target`.
pub fn exporter_for(target: ExportTarget) -> &'static dyn Exporter {
    match target {
        ExportTarget::PlainText => &PlainTextExporter,
        ExportTarget::Markdown => &MarkdownExporter,
        ExportTarget::Csv => &CsvExporter,
        ExportTarget::Xlsx => &XlsxExporter,
        ExportTarget::Docx => &DocxExporter,
        ExportTarget::Pdf => &PdfExporter,
    }
}

/// Serialize `text` to `target`.
///
/// # Examples
///
/// ```
/// use careermask::export::{export, ExportTarget};
/// use careermask::offset::OffsetMap;
///
/// let bytes = export("a\tb\nc", &OffsetMap::new(), ExportTarget::Csv).unwrap();
/// assert!(String::from_utf8(bytes).unwrap().ends_with("a,b\r\nc\r\n"));
/// ```
pub fn export(text: &str, map: &OffsetMap, target: ExportTarget) -> Result<Vec<u8>> {
    let bytes = exporter_for(target).export(text, map)?;
    log::debug!("exported {} chars as {} ({} bytes)", text.chars().count(), target, bytes.len());
    Ok(bytes)
}

/// Lines of `text` paired with their decoder origin.
pub(crate) fn lines_with_origins<'a>(text: &'a str, map: &'a OffsetMap) -> impl Iterator<Item = (&'a str, Option<&'a Origin>)> {
    text.split('\n')
        .enumerate()
        .map(move |(i, line)| (line, map.line_origin(i)))
}

/// Escape text for XML content, dropping characters XML 1.0 forbids.
pub(crate) fn xml_text(text: &str) -> Cow<'_, str> {
    let is_allowed = |c: char| !c.is_control() || c == '\t' || c == '\n' || c == '\r';
    if text.chars().all(is_allowed) {
        quick_xml::escape::escape(text)
    } else {
        let cleaned: String = text.chars().filter(|c| is_allowed(*c)).collect();
        Cow::Owned(quick_xml::escape::escape(cleaned.as_str()).into_owned())
    }
}

/// Write a ZIP container from `(path, content)` parts.
pub(crate) fn write_zip<S: AsRef<str>>(parts: &[(S, String)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (path, content) in parts {
        let path = path.as_ref();
        zip.start_file(path, options)
            .map_err(|e| Error::Export(format!("failed to add {}: {}", path, e)))?;
        zip.write_all(content.as_bytes())?;
    }
    let cursor = zip
        .finish()
        .map_err(|e| Error::Export(format!("failed to finish container: {}", e)))?;
    Ok(cursor.into_inner())
}

/// `docProps/core.xml` with a creation timestamp.
pub(crate) fn core_properties() -> String {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            r#"<dc:creator>careermask</dc:creator>"#,
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created>"#,
            r#"</cp:coreProperties>"#
        ),
        now = now
    )
}
