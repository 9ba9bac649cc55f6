//! OpenDocument text decoder.
//!
//! Reads `content.xml` and emits one line per paragraph or heading and one
//! line per table row. Runs of spaces (`text:s`), tabs, and line breaks are
//! expanded. Annotations and tracked-change records are skipped.

use super::docx::get_attribute;
use super::{open_zip, read_zip_entry, DecodeLimits, DecodeResult, Decoder};
use crate::error::DecodeError;
use crate::format::Format;
use crate::offset::{NormalizedText, Origin, TextBuilder};
use quick_xml::events::Event;
use quick_xml::Reader;

/// OpenDocument text decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct OdtDecoder;

/// Upper bound for `text:c` and `number-columns-repeated` expansion.
const MAX_REPEAT: usize = 256;

impl Decoder for OdtDecoder {
    fn format(&self) -> Format {
        Format::Odt
    }

    fn decode(&self, bytes: &[u8], limits: &DecodeLimits) -> DecodeResult<NormalizedText> {
        let mut archive = open_zip(bytes, Format::Odt)?;
        let content = read_zip_entry(&mut archive, "content.xml", Format::Odt, limits)?
            .ok_or_else(|| DecodeError::unsupported(Format::Odt, "missing content.xml"))?;

        let mut builder = TextBuilder::new(Format::Odt);
        parse_content(&content, &mut builder)?;

        if let Some(meta) = read_zip_entry(&mut archive, "meta.xml", Format::Odt, limits)? {
            builder.set_page_count(page_count(&meta));
        }
        builder.trim_trailing_blank_lines();
        Ok(builder.finish())
    }
}

fn parse_content(xml: &str, builder: &mut TextBuilder) -> DecodeResult<()> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut paragraph = String::new();
    let mut paragraph_depth = 0usize;
    let mut paragraph_index = 0usize;
    let mut list_marker = false;
    let mut skip_depth = 0usize;
    let mut in_body = false;

    let mut table_depth = 0usize;
    let mut tables_seen = 0usize;
    let mut table_index = 0usize;
    let mut table_row = 0usize;
    let mut cells: Vec<String> = Vec::new();
    let mut cell_repeat = 1usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) if skip_depth > 0 => skip_depth += 1,
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"text" => in_body = true,
                b"annotation" | b"tracked-changes" | b"note-citation" | b"sequence-decls" => {
                    skip_depth = 1
                },
                b"p" | b"h" if in_body => {
                    paragraph_depth += 1;
                    if paragraph_depth == 1 {
                        // Cells collect all their paragraphs
                        if table_depth == 0 {
                            paragraph.clear();
                            if list_marker {
                                paragraph.push_str("- ");
                            }
                        }
                        list_marker = false;
                    } else if !paragraph.ends_with(' ') {
                        paragraph.push(' ');
                    }
                },
                b"list-item" => list_marker = true,
                b"table" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        table_index = tables_seen;
                        tables_seen += 1;
                        table_row = 0;
                    }
                },
                b"table-row" if table_depth == 1 => cells.clear(),
                b"table-cell" if table_depth == 1 => {
                    cell_repeat = repeat_count(e, "number-columns-repeated");
                    paragraph.clear();
                },
                _ => {},
            },
            Ok(Event::Empty(_)) if skip_depth > 0 => {},
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"s" => {
                    let n = repeat_count(e, "c");
                    paragraph.extend(std::iter::repeat(' ').take(n));
                },
                b"tab" => paragraph.push(if table_depth > 0 { ' ' } else { '\t' }),
                b"line-break" => paragraph.push(if table_depth > 0 { ' ' } else { '\n' }),
                b"p" | b"h" if in_body && table_depth == 0 && paragraph_depth == 0 => {
                    builder.push_line("", Origin::Paragraph { index: paragraph_index });
                    paragraph_index += 1;
                },
                // Empty cells still hold their column position
                b"table-cell" if table_depth == 1 => {
                    let n = repeat_count(e, "number-columns-repeated");
                    cells.extend(std::iter::repeat(String::new()).take(n));
                },
                _ => {},
            },
            Ok(Event::Text(e)) => {
                if skip_depth == 0 && paragraph_depth > 0 {
                    let text = e
                        .unescape()
                        .map_err(|err| DecodeError::corrupt(Format::Odt, err.to_string()))?;
                    paragraph.push_str(&text);
                }
            },
            Ok(Event::End(_)) if skip_depth > 0 => skip_depth -= 1,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"text" => in_body = false,
                b"p" | b"h" if paragraph_depth > 0 => {
                    paragraph_depth -= 1;
                    if paragraph_depth == 0 && table_depth == 0 {
                        let line = std::mem::take(&mut paragraph);
                        builder.push_line(&line, Origin::Paragraph { index: paragraph_index });
                        paragraph_index += 1;
                    } else if paragraph_depth == 0 && !paragraph.ends_with(' ') {
                        // Paragraphs inside one cell are joined by a space
                        paragraph.push(' ');
                    }
                },
                b"table-cell" if table_depth == 1 => {
                    let cell = std::mem::take(&mut paragraph).replace(['\t', '\n'], " ");
                    let cell = cell.trim().to_string();
                    let n = if cell.is_empty() { cell_repeat } else { cell_repeat.min(MAX_REPEAT) };
                    cells.extend(std::iter::repeat(cell).take(n));
                },
                b"table-row" if table_depth == 1 => {
                    let mut row = std::mem::take(&mut cells);
                    while row.last().is_some_and(|c| c.is_empty()) {
                        row.pop();
                    }
                    builder.push_line(
                        &row.join("\t"),
                        Origin::TableRow {
                            table: table_index,
                            row: table_row,
                        },
                    );
                    table_row += 1;
                },
                b"table" => table_depth = table_depth.saturating_sub(1),
                _ => {},
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                if builder.line_count() == 0 {
                    return Err(DecodeError::corrupt(
                        Format::Odt,
                        format!("malformed content.xml at {}: {}", reader.buffer_position(), e),
                    ));
                }
                builder.warn(format!("content.xml truncated: {}", e));
                break;
            },
            _ => {},
        }
        buf.clear();
    }
    Ok(())
}

fn repeat_count(e: &quick_xml::events::BytesStart, attr: &str) -> usize {
    get_attribute(e, attr)
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_REPEAT)
}

fn page_count(meta: &str) -> Option<u32> {
    let mut reader = Reader::from_str(meta);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"document-statistic" =>
            {
                return get_attribute(e, "page-count").and_then(|v| v.parse().ok());
            },
            Ok(Event::Eof) | Err(_) => return None,
            _ => {},
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(inner: &str) -> NormalizedText {
        let xml = format!(
            r#"<?xml version="1.0"?><office:document-content xmlns:office="o" xmlns:text="t" xmlns:table="tb"><office:body><office:text>{}</office:text></office:body></office:document-content>"#,
            inner
        );
        let mut builder = TextBuilder::new(Format::Odt);
        parse_content(&xml, &mut builder).unwrap();
        builder.trim_trailing_blank_lines();
        builder.finish()
    }

    #[test]
    fn test_paragraphs_and_spaces() {
        let t = content(r#"<text:h>Taro Yamada</text:h><text:p>a<text:s text:c="3"/>b<text:tab/>c<text:line-break/>d</text:p>"#);
        assert_eq!(t.text, "Taro Yamada\na   b\tc\nd");
        assert_eq!(t.origin_of(0), Some(&Origin::Paragraph { index: 0 }));
        assert_eq!(t.origin_of(t.text.find("a   b").unwrap()), Some(&Origin::Paragraph { index: 1 }));
    }

    #[test]
    fn test_list_items() {
        let t = content(r#"<text:list><text:list-item><text:p>Rust</text:p></text:list-item><text:list-item><text:p>Go</text:p></text:list-item></text:list>"#);
        assert_eq!(t.text, "- Rust\n- Go");
    }

    #[test]
    fn test_table_rows() {
        let t = content(r#"<table:table><table:table-row><table:table-cell><text:p>Name</text:p></table:table-cell><table:table-cell><text:p>Taro</text:p></table:table-cell><table:table-cell table:number-columns-repeated="3"/></table:table-row></table:table>"#);
        assert_eq!(t.text, "Name\tTaro");
        assert_eq!(t.origin_of(0), Some(&Origin::TableRow { table: 0, row: 0 }));
    }

    #[test]
    fn test_annotations_skipped() {
        let t = content(r#"<text:p>kept<office:annotation><text:p>note</text:p></office:annotation></text:p>"#);
        assert_eq!(t.text, "kept");
    }

    #[test]
    fn test_page_count() {
        let meta = r#"<office:document-meta><office:meta><meta:document-statistic meta:page-count="2" meta:word-count="10"/></office:meta></office:document-meta>"#;
        assert_eq!(page_count(meta), Some(2));
    }
}
