//! DOCX decoder.
//!
//! Reads `word/document.xml` from the package and emits one line per body
//! paragraph and one line per table row (cells joined by `\t`). Deleted
//! revisions, field instructions, and `mc:Fallback` duplicates are skipped.
//! The page count comes from `docProps/app.xml` when present.

use super::{open_zip, read_zip_entry, DecodeLimits, DecodeResult, Decoder};
use crate::error::DecodeError;
use crate::format::Format;
use crate::offset::{NormalizedText, Origin, TextBuilder};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// DOCX decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxDecoder;

impl Decoder for DocxDecoder {
    fn format(&self) -> Format {
        Format::Docx
    }

    fn decode(&self, bytes: &[u8], limits: &DecodeLimits) -> DecodeResult<NormalizedText> {
        let mut archive = open_zip(bytes, Format::Docx)?;

        if archive.by_name("EncryptedPackage").is_ok() {
            return Err(DecodeError::unsupported(Format::Docx, "password-protected document"));
        }
        let xml = read_zip_entry(&mut archive, "word/document.xml", Format::Docx, limits)?
            .ok_or_else(|| DecodeError::unsupported(Format::Docx, "missing word/document.xml"))?;

        let mut builder = TextBuilder::new(Format::Docx);
        parse_body(&xml, &mut builder)?;

        if let Some(app) = read_zip_entry(&mut archive, "docProps/app.xml", Format::Docx, limits)? {
            builder.set_page_count(element_number(&app, b"Pages"));
        }
        builder.trim_trailing_blank_lines();
        Ok(builder.finish())
    }
}

/// Table cell/row accumulator.
#[derive(Default)]
struct TableState {
    index: usize,
    row: usize,
    cells: Vec<String>,
    cell: String,
}

fn parse_body(xml: &str, builder: &mut TextBuilder) -> DecodeResult<()> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut paragraph = String::new();
    let mut paragraph_index = 0usize;
    let mut list_item = false;
    let mut in_text = false;
    // Depth inside elements whose content must be ignored
    let mut skip_depth = 0usize;
    let mut table_depth = 0usize;
    let mut tables_seen = 0usize;
    let mut table = TableState::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) if skip_depth > 0 => skip_depth += 1,
            Ok(Event::Start(ref e)) => {
                match e.local_name().as_ref() {
                    b"Fallback" | b"delText" | b"instrText" | b"del" => skip_depth = 1,
                    b"t" => in_text = true,
                    b"p" => {
                        paragraph.clear();
                        list_item = false;
                    },
                    b"numPr" => list_item = true,
                    b"tbl" => {
                        table_depth += 1;
                        if table_depth == 1 {
                            table = TableState {
                                index: tables_seen,
                                ..TableState::default()
                            };
                            tables_seen += 1;
                        }
                    },
                    b"tr" if table_depth == 1 => table.cells.clear(),
                    b"tc" if table_depth == 1 => table.cell.clear(),
                    _ => {},
                }
            },
            Ok(Event::Empty(_)) if skip_depth > 0 => {},
            Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    b"tab" => paragraph.push(if table_depth > 0 { ' ' } else { '\t' }),
                    b"br" | b"cr" => {
                        if table_depth > 0 || is_page_break(e) {
                            paragraph.push(' ');
                        } else {
                            paragraph.push('\n');
                        }
                    },
                    b"noBreakHyphen" => paragraph.push('-'),
                    b"numPr" => list_item = true,
                    b"p" if table_depth == 0 => {
                        builder.push_line("", Origin::Paragraph { index: paragraph_index });
                        paragraph_index += 1;
                    },
                    _ => {},
                }
            },
            Ok(Event::Text(e)) => {
                if in_text && skip_depth == 0 {
                    let text = e
                        .unescape()
                        .map_err(|err| DecodeError::corrupt(Format::Docx, err.to_string()))?;
                    paragraph.push_str(&text);
                }
            },
            Ok(Event::End(_)) if skip_depth > 0 => skip_depth -= 1,
            Ok(Event::End(ref e)) => {
                match e.local_name().as_ref() {
                    b"t" => in_text = false,
                    b"p" => {
                        let text = std::mem::take(&mut paragraph);
                        if table_depth > 0 {
                            let text = text.trim();
                            if !text.is_empty() {
                                if !table.cell.is_empty() {
                                    table.cell.push(' ');
                                }
                                table.cell.push_str(text);
                            }
                        } else {
                            let line = if list_item && !text.is_empty() {
                                format!("- {}", text)
                            } else {
                                text
                            };
                            builder.push_line(&line, Origin::Paragraph { index: paragraph_index });
                            paragraph_index += 1;
                        }
                    },
                    b"tc" if table_depth == 1 => {
                        let cell = std::mem::take(&mut table.cell).replace(['\t', '\n'], " ");
                        table.cells.push(cell);
                    },
                    b"tr" if table_depth == 1 => {
                        let mut cells = std::mem::take(&mut table.cells);
                        while cells.last().is_some_and(|c| c.is_empty()) {
                            cells.pop();
                        }
                        builder.push_line(
                            &cells.join("\t"),
                            Origin::TableRow {
                                table: table.index,
                                row: table.row,
                            },
                        );
                        table.row += 1;
                    },
                    b"tbl" => table_depth = table_depth.saturating_sub(1),
                    _ => {},
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                if builder.line_count() == 0 {
                    return Err(DecodeError::corrupt(
                        Format::Docx,
                        format!("malformed document.xml at {}: {}", reader.buffer_position(), e),
                    ));
                }
                builder.warn(format!("document.xml truncated: {}", e));
                break;
            },
            _ => {},
        }
        buf.clear();
    }
    Ok(())
}

fn is_page_break(e: &BytesStart) -> bool {
    get_attribute(e, "type").is_some_and(|t| t == "page" || t == "column")
}

/// Get an attribute value by local name (ignores the namespace prefix).
pub(crate) fn get_attribute(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        let key = attr.key.local_name();
        if key.as_ref() == name.as_bytes() {
            return Some(String::from_utf8_lossy(&attr.value).to_string());
        }
    }
    None
}

/// Read the first numeric text content of an element named `tag`.
pub(crate) fn element_number(xml: &str, tag: &[u8]) -> Option<u32> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut inside = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == tag => inside = true,
            Ok(Event::Text(e)) if inside => {
                return e.unescape().ok().and_then(|t| t.trim().parse().ok());
            },
            Ok(Event::End(_)) => inside = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {},
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(inner: &str) -> NormalizedText {
        let xml = format!(
            r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            inner
        );
        let mut builder = TextBuilder::new(Format::Docx);
        parse_body(&xml, &mut builder).unwrap();
        builder.trim_trailing_blank_lines();
        builder.finish()
    }

    #[test]
    fn test_paragraphs_and_runs() {
        let t = body(r#"<w:p><w:r><w:t>Taro</w:t></w:r><w:r><w:t xml:space="preserve"> Yamada</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>Tokyo &amp; Osaka</w:t></w:r></w:p>"#);
        assert_eq!(t.text, "Taro Yamada\n\nTokyo & Osaka");
        assert_eq!(t.origin_of(t.text.find("Tokyo").unwrap()), Some(&Origin::Paragraph { index: 2 }));
    }

    #[test]
    fn test_tabs_breaks_and_lists() {
        let t = body(r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/></w:numPr></w:pPr><w:r><w:t>Rust</w:t></w:r></w:p><w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>"#);
        assert_eq!(t.text, "- Rust\na\tb\nc");
    }

    #[test]
    fn test_table_rows() {
        let t = body(r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Taro</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>City</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Tokyo</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#);
        assert_eq!(t.text, "Name\tTaro\nCity\tTokyo");
        assert_eq!(
            t.origin_of(t.text.find("Tokyo").unwrap()),
            Some(&Origin::TableRow { table: 0, row: 1 })
        );
    }

    #[test]
    fn test_deleted_and_fallback_text_skipped() {
        let t = body(r#"<w:p><w:del><w:r><w:delText>old</w:delText></w:r></w:del><w:r><w:t>new</w:t></w:r><mc:AlternateContent xmlns:mc="m"><mc:Choice><w:r><w:t>!</w:t></w:r></mc:Choice><mc:Fallback><w:r><w:t>!</w:t></w:r></mc:Fallback></mc:AlternateContent></w:p>"#);
        assert_eq!(t.text, "new!");
    }

    #[test]
    fn test_element_number() {
        assert_eq!(element_number("<Properties><Pages>3</Pages></Properties>", b"Pages"), Some(3));
        assert_eq!(element_number("<Properties/>", b"Pages"), None);
    }

    #[test]
    fn test_not_a_zip() {
        let err = DocxDecoder
            .decode(b"plain text", &DecodeLimits::default())
            .unwrap_err();
        assert_eq!(err.kind, crate::error::DecodeErrorKind::Corrupt);
    }
}
