//! PDF exporter.
//!
//! Assembles a complete PDF document with proper structure: header, body,
//! xref table, and trailer. Text is laid out as wrapped lines on A4 pages.
//!
//! Text that fits WinAnsi is set in Helvetica. Anything else (Japanese in
//! practice) uses the non-embedded `HeiseiKakuGo-W5` CID font with the
//! `UniJIS-UCS2-H` CMap, which every conforming reader ships with.

use super::{ExportTarget, Exporter};
use crate::error::Result;
use crate::offset::OffsetMap;
use std::io::Write;

/// A4 width in points.
const PAGE_WIDTH: f32 = 595.0;
/// A4 height in points.
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 56.0;
const FONT_SIZE: f32 = 10.5;
const LEADING: f32 = 14.0;
const TAB_WIDTH: usize = 4;

const CJK_FONT: &str = "HeiseiKakuGo-W5";

/// Configuration for PDF generation.
#[derive(Debug, Clone)]
pub struct PdfWriterConfig {
    /// PDF version (e.g., "1.7")
    pub version: String,
    /// Document title
    pub title: Option<String>,
    /// Document author
    pub author: Option<String>,
    /// Document subject
    pub subject: Option<String>,
    /// Creator application
    pub creator: Option<String>,
    /// Whether to compress streams
    pub compress: bool,
}

impl Default for PdfWriterConfig {
    fn default() -> Self {
        Self {
            version: "1.7".to_string(),
            title: None,
            author: None,
            subject: None,
            creator: Some("careermask".to_string()),
            compress: true,
        }
    }
}

impl PdfWriterConfig {
    /// Set document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set document author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set document subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Enable or disable stream compression (FlateDecode).
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Compress data using Flate/Deflate compression.
fn compress_data(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Font family chosen for the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FontKind {
    WinAnsi,
    Cjk,
}

impl FontKind {
    fn for_pages(pages: &[Vec<String>]) -> Self {
        let fits = pages.iter().flatten().all(|line| {
            let (_, _, unmappable) = encoding_rs::WINDOWS_1252.encode(line);
            !unmappable
        });
        if fits {
            FontKind::WinAnsi
        } else {
            FontKind::Cjk
        }
    }

    /// Encode one line as a PDF string operand.
    fn show_operand(&self, line: &str) -> String {
        match self {
            FontKind::WinAnsi => {
                let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(line);
                literal_string(&bytes)
            },
            FontKind::Cjk => {
                let mut hex = String::with_capacity(line.len() * 4 + 2);
                hex.push('<');
                for c in line.chars() {
                    let code = if (c as u32) <= 0xFFFF { c as u32 } else { '?' as u32 };
                    hex.push_str(&format!("{:04X}", code));
                }
                hex.push('>');
                hex
            },
        }
    }
}

/// Escape bytes into a PDF literal string.
fn literal_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('(');
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out.push(')');
    out
}

/// Info dictionary string: literal for ASCII, UTF-16BE with BOM otherwise.
fn text_string(s: &str) -> String {
    if s.is_ascii() {
        return literal_string(s.as_bytes());
    }
    let mut hex = String::from("<FEFF");
    for unit in s.encode_utf16() {
        hex.push_str(&format!("{:04X}", unit));
    }
    hex.push('>');
    hex
}

/// PDF document writer.
///
/// Collects pages of text lines; fonts and objects are allocated in
/// [`PdfWriter::finish`].
#[derive(Debug, Default)]
pub struct PdfWriter {
    config: PdfWriterConfig,
    pages: Vec<Vec<String>>,
}

impl PdfWriter {
    /// Create a new PDF writer with default config.
    pub fn new() -> Self {
        Self::with_config(PdfWriterConfig::default())
    }

    /// Create a PDF writer with custom config.
    pub fn with_config(config: PdfWriterConfig) -> Self {
        Self {
            config,
            pages: Vec::new(),
        }
    }

    /// Lines that fit on one page.
    pub fn lines_per_page() -> usize {
        ((PAGE_HEIGHT - 2.0 * MARGIN) / LEADING).floor() as usize
    }

    /// Add one A4 page showing `lines` top to bottom.
    pub fn add_page(&mut self, lines: Vec<String>) {
        self.pages.push(lines);
    }

    /// Lay out `text` (wrapping long lines) across as many pages as needed.
    pub fn add_text(&mut self, text: &str) {
        let max_em = (PAGE_WIDTH - 2.0 * MARGIN) / FONT_SIZE;
        let wrapped: Vec<String> = text
            .split('\n')
            .flat_map(|line| wrap_line(&line.replace('\t', &" ".repeat(TAB_WIDTH)), max_em))
            .collect();
        for chunk in wrapped.chunks(Self::lines_per_page()) {
            self.add_page(chunk.to_vec());
        }
    }

    /// Number of pages added.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn content_stream(font: FontKind, lines: &[String]) -> Vec<u8> {
        let mut content = String::new();
        content.push_str("BT\n");
        content.push_str(&format!("/F1 {} Tf\n{} TL\n", FONT_SIZE, LEADING));
        content.push_str(&format!("{} {} Td\n", MARGIN, PAGE_HEIGHT - MARGIN - FONT_SIZE));
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                content.push_str("T*\n");
            }
            if !line.is_empty() {
                content.push_str(&font.show_operand(line));
                content.push_str(" Tj\n");
            }
        }
        content.push_str("ET\n");
        content.into_bytes()
    }

    /// Build the complete PDF document.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let font = FontKind::for_pages(&self.pages);
        let mut output = Vec::new();
        let mut xref_offsets: Vec<usize> = Vec::new();

        // PDF Header
        writeln!(output, "%PDF-{}", self.config.version)?;
        // Binary marker
        output.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        // Fixed objects come first, pages after
        let catalog_id = 1;
        let pages_id = 2;
        let font_id = 3;
        let first_page_id = match font {
            FontKind::WinAnsi => 4,
            FontKind::Cjk => 6,
        };
        let page_ids: Vec<(u32, u32)> = (0..self.pages.len() as u32)
            .map(|i| (first_page_id + 2 * i, first_page_id + 2 * i + 1))
            .collect();
        let info_id = first_page_id + 2 * self.pages.len() as u32;

        let mut write_object = |output: &mut Vec<u8>, id: u32, body: &[u8]| -> std::io::Result<()> {
            xref_offsets.push(output.len());
            writeln!(output, "{} 0 obj", id)?;
            output.extend_from_slice(body);
            output.extend_from_slice(b"\nendobj\n");
            Ok(())
        };

        write_object(
            &mut output,
            catalog_id,
            format!("<< /Type /Catalog /Pages {} 0 R >>", pages_id).as_bytes(),
        )?;

        let kids: Vec<String> = page_ids.iter().map(|(p, _)| format!("{} 0 R", p)).collect();
        write_object(
            &mut output,
            pages_id,
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), page_ids.len()).as_bytes(),
        )?;

        match font {
            FontKind::WinAnsi => {
                write_object(
                    &mut output,
                    font_id,
                    b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
                )?;
            },
            FontKind::Cjk => {
                write_object(
                    &mut output,
                    font_id,
                    format!(
                        "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /UniJIS-UCS2-H /DescendantFonts [4 0 R] >>",
                        CJK_FONT
                    )
                    .as_bytes(),
                )?;
                write_object(
                    &mut output,
                    4,
                    format!(
                        "<< /Type /Font /Subtype /CIDFontType0 /BaseFont /{} \
                         /CIDSystemInfo << /Registry (Adobe) /Ordering (Japan1) /Supplement 2 >> \
                         /FontDescriptor 5 0 R /DW 1000 /W [1 95 500 231 632 500] >>",
                        CJK_FONT
                    )
                    .as_bytes(),
                )?;
                write_object(
                    &mut output,
                    5,
                    format!(
                        "<< /Type /FontDescriptor /FontName /{} /Flags 4 /FontBBox [-92 -250 1010 922] \
                         /ItalicAngle 0 /Ascent 880 /Descent -120 /CapHeight 737 /StemV 69 >>",
                        CJK_FONT
                    )
                    .as_bytes(),
                )?;
            },
        }

        for (lines, (page_id, content_id)) in self.pages.iter().zip(&page_ids) {
            let page = format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Contents {} 0 R \
                 /Resources << /Font << /F1 {} 0 R >> >> >>",
                pages_id, PAGE_WIDTH, PAGE_HEIGHT, content_id, font_id
            );
            write_object(&mut output, *page_id, page.as_bytes())?;

            let raw_content = Self::content_stream(font, lines);
            // Fall back to uncompressed on error
            let (content_bytes, is_compressed) = if self.config.compress {
                match compress_data(&raw_content) {
                    Ok(compressed) => (compressed, true),
                    Err(_) => (raw_content, false),
                }
            } else {
                (raw_content, false)
            };
            let mut stream = format!("<< /Length {}", content_bytes.len()).into_bytes();
            if is_compressed {
                stream.extend_from_slice(b" /Filter /FlateDecode");
            }
            stream.extend_from_slice(b" >>\nstream\n");
            stream.extend_from_slice(&content_bytes);
            stream.extend_from_slice(b"\nendstream");
            write_object(&mut output, *content_id, &stream)?;
        }

        // Info object (optional metadata)
        let mut info = String::from("<<");
        let entries = [
            ("Title", &self.config.title),
            ("Author", &self.config.author),
            ("Subject", &self.config.subject),
            ("Creator", &self.config.creator),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                info.push_str(&format!(" /{} {}", key, text_string(value)));
            }
        }
        let created = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
        info.push_str(&format!(" /CreationDate {} >>", literal_string(created.as_bytes())));
        write_object(&mut output, info_id, info.as_bytes())?;

        // Write xref table
        let size = info_id + 1;
        let xref_start = output.len();
        writeln!(output, "xref")?;
        writeln!(output, "0 {}", size)?;
        // Object 0 is always free
        writeln!(output, "0000000000 65535 f ")?;
        for offset in &xref_offsets {
            writeln!(output, "{:010} 00000 n ", offset)?;
        }

        // Write trailer
        writeln!(output, "trailer")?;
        writeln!(output, "<< /Size {} /Root {} 0 R /Info {} 0 R >>", size, catalog_id, info_id)?;
        writeln!(output, "startxref")?;
        writeln!(output, "{}", xref_start)?;
        writeln!(output, "%%EOF")?;

        log::debug!("wrote PDF with {} pages ({:?} font)", self.pages.len(), font);
        Ok(output)
    }
}

/// Estimated advance of `c` in ems: half width for Latin, full for the rest.
fn char_width_em(c: char) -> f32 {
    if (c as u32) < 0x0370 || ('\u{FF61}'..='\u{FF9F}').contains(&c) {
        0.5
    } else {
        1.0
    }
}

/// Break `line` so every piece fits `max_em`, preferring the last space.
fn wrap_line(line: &str, max_em: f32) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut width = 0.0;
    let mut last_space: Option<usize> = None;
    for c in line.chars() {
        let w = char_width_em(c);
        if width + w > max_em && !current.is_empty() {
            match last_space {
                Some(idx) if idx > 0 => {
                    let rest = current.split_off(idx + 1);
                    out.push(current.trim_end().to_string());
                    current = rest;
                },
                _ => out.push(std::mem::take(&mut current)),
            }
            width = current.chars().map(char_width_em).sum();
            last_space = None;
        }
        if c == ' ' {
            last_space = Some(current.len());
        }
        current.push(c);
        width += w;
    }
    out.push(current);
    out
}

/// Paginated PDF of the view text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExporter;

impl Exporter for PdfExporter {
    fn target(&self) -> ExportTarget {
        ExportTarget::Pdf
    }

    fn export(&self, text: &str, _map: &OffsetMap) -> Result<Vec<u8>> {
        let mut writer = PdfWriter::new();
        writer.add_text(text);
        writer.finish()
    }
}
