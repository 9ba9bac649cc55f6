//! Spreadsheet decoder (XLSX, XLSM, XLS, ODS).
//!
//! Uses calamine to read every worksheet. Each sheet starts with a line
//! holding its name, followed by one line per row with cells joined by `\t`.
//! Rows keep their absolute position, so the offset map recovers the exact
//! cell coordinates.

use super::{DecodeLimits, DecodeResult, Decoder};
use crate::error::DecodeError;
use crate::format::Format;
use crate::offset::{NormalizedText, Origin, TextBuilder};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;

/// Spreadsheet decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetDecoder;

impl Decoder for SpreadsheetDecoder {
    fn format(&self) -> Format {
        Format::Spreadsheet
    }

    fn decode(&self, bytes: &[u8], _limits: &DecodeLimits) -> DecodeResult<NormalizedText> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
            let message = e.to_string();
            let lower = message.to_ascii_lowercase();
            if lower.contains("password") || lower.contains("encrypt") {
                DecodeError::unsupported(Format::Spreadsheet, format!("encrypted workbook: {}", message))
            } else {
                DecodeError::corrupt(Format::Spreadsheet, format!("failed to open workbook: {}", message))
            }
        })?;

        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
        if sheet_names.is_empty() {
            return Err(DecodeError::empty(Format::Spreadsheet));
        }

        let mut builder = TextBuilder::new(Format::Spreadsheet);
        for (sheet, name) in sheet_names.iter().enumerate() {
            match workbook.worksheet_range(name) {
                Ok(range) => push_sheet(&mut builder, sheet, name, &range),
                Err(e) => builder.warn(format!("sheet '{}' skipped: {}", name, e)),
            }
        }
        builder.trim_trailing_blank_lines();
        Ok(builder.finish())
    }
}

fn push_sheet(builder: &mut TextBuilder, sheet: usize, name: &str, range: &Range<Data>) {
    builder.push_line(&flatten_cell(name), Origin::SheetName { sheet });
    let (first_row, first_col) = match range.start() {
        Some(start) => start,
        None => return,
    };
    for (offset, row) in range.rows().enumerate() {
        let mut cells: Vec<String> = row.iter().map(cell_to_string).collect();
        while cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        builder.push_line(
            &cells.join("\t"),
            Origin::Cell {
                sheet,
                row: first_row + offset as u32,
                col: first_col,
            },
        );
    }
}

/// Render a cell the way it reads in the sheet.
fn cell_to_string(cell: &Data) -> String {
    let text = match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        },
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{:?}", e),
    };
    flatten_cell(&text)
}

/// Tabs and line breaks are structural in normalized text.
fn flatten_cell(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Int(42)), "42");
        assert_eq!(cell_to_string(&Data::Float(3.0)), "3");
        assert_eq!(cell_to_string(&Data::Float(1.25)), "1.25");
        assert_eq!(cell_to_string(&Data::Bool(true)), "TRUE");
        assert_eq!(cell_to_string(&Data::String("a\tb\nc".into())), "a b c");
    }

    #[test]
    fn test_not_a_workbook() {
        let err = SpreadsheetDecoder
            .decode(b"not a spreadsheet at all", &DecodeLimits::default())
            .unwrap_err();
        assert_eq!(err.format, Format::Spreadsheet);
    }
}
