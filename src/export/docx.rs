//! Minimal DOCX exporter.
//!
//! Writes `[Content_Types].xml`, the package relationships, core properties,
//! and `word/document.xml`. Lines from the same source paragraph are rejoined
//! with `<w:br/>`; lines from one source table become `<w:tbl>` rows.

use super::{core_properties, lines_with_origins, write_zip, xml_text, ExportTarget, Exporter};
use crate::error::Result;
use crate::offset::{OffsetMap, Origin};

/// Office Open XML document.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxExporter;

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#,
    r#"</Types>"#
);

const PACKAGE_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
    r#"</Relationships>"#
);

/// Body block being assembled.
enum Block<'a> {
    Paragraph { index: Option<usize>, lines: Vec<&'a str> },
    Table { index: usize, rows: Vec<&'a str> },
}

impl Exporter for DocxExporter {
    fn target(&self) -> ExportTarget {
        ExportTarget::Docx
    }

    fn export(&self, text: &str, map: &OffsetMap) -> Result<Vec<u8>> {
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", PACKAGE_RELS.to_string()),
            ("docProps/core.xml", core_properties()),
            ("word/document.xml", document_xml(text, map)),
        ];
        write_zip(&parts)
    }
}

fn collect_blocks<'a>(text: &'a str, map: &'a OffsetMap) -> Vec<Block<'a>> {
    let mut blocks: Vec<Block<'a>> = Vec::new();
    if text.is_empty() {
        return blocks;
    }
    for (line, origin) in lines_with_origins(text, map) {
        match origin {
            Some(Origin::TableRow { table, .. }) => {
                if let Some(Block::Table { index, rows }) = blocks.last_mut() {
                    if index == table {
                        rows.push(line);
                        continue;
                    }
                }
                blocks.push(Block::Table {
                    index: *table,
                    rows: vec![line],
                });
            },
            Some(Origin::Paragraph { index: p }) => {
                if let Some(Block::Paragraph { index: Some(last), lines }) = blocks.last_mut() {
                    if last == p {
                        lines.push(line);
                        continue;
                    }
                }
                blocks.push(Block::Paragraph {
                    index: Some(*p),
                    lines: vec![line],
                });
            },
            _ => blocks.push(Block::Paragraph {
                index: None,
                lines: vec![line],
            }),
        }
    }
    blocks
}

fn document_xml(text: &str, map: &OffsetMap) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    ));
    for block in collect_blocks(text, map) {
        match block {
            Block::Paragraph { lines, .. } => push_paragraph(&mut xml, &lines),
            Block::Table { rows, .. } => {
                xml.push_str("<w:tbl>");
                for row in rows {
                    xml.push_str("<w:tr>");
                    for cell in row.split('\t') {
                        xml.push_str("<w:tc>");
                        push_paragraph(&mut xml, &[cell]);
                        xml.push_str("</w:tc>");
                    }
                    xml.push_str("</w:tr>");
                }
                xml.push_str("</w:tbl>");
            },
        }
    }
    xml.push_str("<w:sectPr/></w:body></w:document>");
    xml
}

fn push_paragraph(xml: &mut String, lines: &[&str]) {
    if lines.iter().all(|l| l.is_empty()) && lines.len() <= 1 {
        xml.push_str("<w:p/>");
        return;
    }
    xml.push_str("<w:p><w:r>");
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            xml.push_str("<w:br/>");
        }
        for (j, piece) in line.split('\t').enumerate() {
            if j > 0 {
                xml.push_str("<w:tab/>");
            }
            if !piece.is_empty() {
                xml.push_str(r#"<w:t xml:space="preserve">"#);
                xml.push_str(&xml_text(piece));
                xml.push_str("</w:t>");
            }
        }
    }
    xml.push_str("</w:r></w:p>");
}
