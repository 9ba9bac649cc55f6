//! Legacy Word (`.doc`) decoder.
//!
//! Binary Word documents are OLE compound files whose text lives in the
//! `WordDocument` stream, usually as UTF-16LE. Without a full piece-table
//! reader this decoder recovers text heuristically: it scans for runs of
//! plausible UTF-16LE text (falling back to 8-bit runs for "compressed"
//! documents), maps Word's control characters to line structure, and always
//! attaches a warning that extraction is approximate.

use super::{DecodeLimits, DecodeResult, Decoder};
use crate::error::DecodeError;
use crate::format::Format;
use crate::offset::{NormalizedText, Origin, TextBuilder};

/// Legacy Word decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyWordDecoder;

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Shortest run (in chars) accepted as document text.
const MIN_RUN: usize = 8;

/// Strings that appear in compound-file metadata rather than body text.
const METADATA_NOISE: &[&str] = &[
    "Root Entry",
    "WordDocument",
    "SummaryInformation",
    "DocumentSummaryInformation",
    "CompObj",
    "1Table",
    "0Table",
    "Microsoft Word",
    "MSWordDoc",
    "Word.Document",
    "Times New Roman",
    "Normal.dot",
    "Default Paragraph Font",
];

impl Decoder for LegacyWordDecoder {
    fn format(&self) -> Format {
        Format::LegacyWord
    }

    fn decode(&self, bytes: &[u8], _limits: &DecodeLimits) -> DecodeResult<NormalizedText> {
        if !bytes.starts_with(&OLE_MAGIC) {
            return Err(DecodeError::corrupt(Format::LegacyWord, "not an OLE compound file"));
        }
        if contains_utf16(bytes, "EncryptedPackage") {
            return Err(DecodeError::unsupported(Format::LegacyWord, "password-protected document"));
        }

        let mut runs = utf16_runs(bytes);
        let mut source = "UTF-16";
        if runs.is_empty() {
            runs = byte_runs(bytes);
            source = "8-bit";
        }
        let body = runs.join("\r");
        let lines = split_word_text(&body);
        if lines.iter().all(|l| l.trim().is_empty()) {
            return Err(DecodeError::empty(Format::LegacyWord));
        }

        let mut builder = TextBuilder::new(Format::LegacyWord);
        builder.warn(format!(
            "binary Word text recovered heuristically from {} runs; layout and some text may be lost",
            source
        ));
        for (index, line) in lines.iter().enumerate() {
            builder.push_line(line, Origin::Paragraph { index });
        }
        builder.trim_trailing_blank_lines();
        Ok(builder.finish())
    }
}

fn contains_utf16(bytes: &[u8], needle: &str) -> bool {
    let encoded: Vec<u8> = needle.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    bytes.windows(encoded.len()).any(|w| w == encoded.as_slice())
}

/// Word control characters kept while scanning.
fn is_word_control(unit: u16) -> bool {
    matches!(unit, 0x07 | 0x09 | 0x0B | 0x0C | 0x0D | 0x13 | 0x14 | 0x15)
}

fn is_text_unit(unit: u16) -> bool {
    matches!(unit,
        0x20..=0x7E
        | 0xA0..=0x17F
        | 0x2010..=0x206F
        | 0x3000..=0x30FF
        | 0x4E00..=0x9FFF
        | 0xFF01..=0xFFEF)
        || is_word_control(unit)
}

/// Random binary data often lands in the CJK block; real text nearly always
/// carries ASCII alphanumerics, kana, or ideographic punctuation too.
fn looks_like_text(run: &str) -> bool {
    let visible = run.chars().filter(|c| !c.is_control()).count();
    if visible < MIN_RUN {
        return false;
    }
    if METADATA_NOISE.iter().any(|noise| run.trim() == *noise) {
        return false;
    }
    run.chars().any(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '\u{3001}' | '\u{3002}' | '\u{3040}'..='\u{30FF}')
    })
}

fn utf16_runs(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current: Vec<u16> = Vec::new();
    // Skip the 512-byte compound file header
    for pair in bytes.get(512..).unwrap_or_default().chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        if is_text_unit(unit) {
            current.push(unit);
        } else {
            flush_utf16(&mut current, &mut runs);
        }
    }
    flush_utf16(&mut current, &mut runs);
    runs
}

fn flush_utf16(current: &mut Vec<u16>, runs: &mut Vec<String>) {
    if current.len() >= MIN_RUN {
        let run = String::from_utf16_lossy(current);
        if looks_like_text(&run) {
            runs.push(run);
        }
    }
    current.clear();
}

fn byte_runs(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for &b in bytes.get(512..).unwrap_or_default() {
        if (0x20..=0x7E).contains(&b) || is_word_control(b as u16) {
            current.push(b as char);
        } else {
            if current.chars().count() >= MIN_RUN * 2 && looks_like_text(&current) {
                runs.push(std::mem::take(&mut current));
            }
            current.clear();
        }
    }
    if current.chars().count() >= MIN_RUN * 2 && looks_like_text(&current) {
        runs.push(current);
    }
    runs
}

/// Map Word's in-band control characters to lines and tabs, dropping field
/// instructions (between 0x13 and 0x14).
fn split_word_text(body: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut field_depth = 0usize;
    let mut in_instruction = false;
    for c in body.chars() {
        match c {
            '\u{13}' => {
                field_depth += 1;
                in_instruction = true;
            },
            '\u{14}' => in_instruction = false,
            '\u{15}' => {
                field_depth = field_depth.saturating_sub(1);
                in_instruction = false;
            },
            _ if in_instruction && field_depth > 0 => {},
            '\r' | '\u{0B}' | '\u{0C}' => {
                lines.push(std::mem::take(&mut line).trim_end().to_string());
            },
            '\u{07}' => line.push('\t'),
            '\t' => line.push('\t'),
            c if c.is_control() => {},
            c => line.push(c),
        }
    }
    if !line.is_empty() {
        lines.push(line.trim_end().to_string());
    }
    lines
        .into_iter()
        .map(|l| l.trim_end_matches('\t').to_string())
        .collect()
}
