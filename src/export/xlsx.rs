//! Minimal XLSX exporter.
//!
//! Writes content types, package and workbook relationships, the workbook,
//! and one worksheet per sheet. Cells are inline strings placed at their
//! original coordinates when the lines came from a spreadsheet.

use super::{core_properties, lines_with_origins, write_zip, xml_text, ExportTarget, Exporter};
use crate::error::Result;
use crate::offset::{OffsetMap, Origin};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

/// Office Open XML workbook.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxExporter;

const PACKAGE_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
    r#"</Relationships>"#
);

#[derive(Debug, Default)]
struct Sheet {
    name: String,
    rows: BTreeMap<u32, BTreeMap<u32, String>>,
}

impl Sheet {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: BTreeMap::new(),
        }
    }

    fn next_row(&self) -> u32 {
        self.rows.keys().next_back().map_or(0, |r| r + 1)
    }

    fn put_row(&mut self, row: u32, first_col: u32, line: &str) {
        let cells = self.rows.entry(row).or_default();
        for (offset, value) in line.split('\t').enumerate() {
            if !value.is_empty() {
                cells.insert(first_col + offset as u32, value.to_string());
            }
        }
    }
}

impl Exporter for XlsxExporter {
    fn target(&self) -> ExportTarget {
        ExportTarget::Xlsx
    }

    fn export(&self, text: &str, map: &OffsetMap) -> Result<Vec<u8>> {
        let sheets = collect_sheets(text, map);
        let names = sheet_names(&sheets);

        let mut parts: Vec<(String, String)> = vec![
            ("[Content_Types].xml".to_string(), content_types(sheets.len())),
            ("_rels/.rels".to_string(), PACKAGE_RELS.to_string()),
            ("docProps/core.xml".to_string(), core_properties()),
            ("xl/workbook.xml".to_string(), workbook(&names)),
            ("xl/_rels/workbook.xml.rels".to_string(), workbook_rels(sheets.len())),
        ];
        for (i, sheet) in sheets.iter().enumerate() {
            parts.push((format!("xl/worksheets/sheet{}.xml", i + 1), worksheet(sheet)));
        }
        write_zip(&parts)
    }
}

/// Group lines into sheets. `SheetName` lines open a sheet, `Cell` lines keep
/// their coordinates, anything else is appended below the last row.
fn collect_sheets(text: &str, map: &OffsetMap) -> Vec<Sheet> {
    let mut sheets: Vec<Sheet> = Vec::new();
    if text.is_empty() {
        sheets.push(Sheet::named("Sheet1"));
        return sheets;
    }
    for (line, origin) in lines_with_origins(text, map) {
        match origin {
            Some(Origin::SheetName { .. }) => sheets.push(Sheet::named(line)),
            Some(Origin::Cell { row, col, .. }) => {
                current(&mut sheets).put_row(*row, *col, line);
            },
            _ => {
                let sheet = current(&mut sheets);
                let row = sheet.next_row();
                sheet.put_row(row, 0, line);
            },
        }
    }
    sheets
}

fn current(sheets: &mut Vec<Sheet>) -> &mut Sheet {
    if sheets.is_empty() {
        sheets.push(Sheet::named("Sheet1"));
    }
    let last = sheets.len() - 1;
    &mut sheets[last]
}

/// Unique sheet names.
///
/// Names are written as they appear in the text so a masked sheet name such
/// as `[NAME] CV` decodes back unchanged. Only characters that can never come
/// out of masking and would break sheet references are replaced.
fn sheet_names(sheets: &[Sheet]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(sheets.len());
    for (i, sheet) in sheets.iter().enumerate() {
        let cleaned: String = sheet
            .name
            .chars()
            .map(|c| if matches!(c, ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
            .collect();
        let base = if cleaned.trim().is_empty() {
            format!("Sheet{}", i + 1)
        } else {
            cleaned
        };
        let mut name = base.clone();
        let mut n = 2;
        while !seen.insert(name.to_lowercase()) {
            name = format!("{} ({})", base, n);
            n += 1;
        }
        names.push(name);
    }
    names
}

/// Spreadsheet column letters for a 0-based index (0 -> A, 26 -> AA).
fn column_name(mut col: u32) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

fn content_types(sheet_count: usize) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
        r#"<Default Extension="xml" ContentType="application/xml"/>"#,
        r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
        r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#,
    ));
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i
        );
    }
    xml.push_str("</Types>");
    xml
}

fn workbook(names: &[String]) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    ));
    for (i, name) in names.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            xml_text(name),
            i + 1,
            i + 1
        );
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    ));
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{0}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{0}.xml"/>"#,
            i
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn worksheet(sheet: &Sheet) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    ));
    for (row, cells) in &sheet.rows {
        if cells.is_empty() {
            continue;
        }
        let _ = write!(xml, r#"<row r="{}">"#, row + 1);
        for (col, value) in cells {
            let _ = write!(
                xml,
                r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_name(*col),
                row + 1,
                xml_text(value)
            );
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}
