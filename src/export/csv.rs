//! CSV exporter (RFC 4180).

use super::{ExportTarget, Exporter};
use crate::error::Result;
use crate::offset::OffsetMap;

/// Comma-separated values. Each line becomes one record; tabs separate
/// fields. A UTF-8 BOM is written so spreadsheet applications pick the right
/// encoding for Japanese text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter;

const BOM: &str = "\u{feff}";

impl Exporter for CsvExporter {
    fn target(&self) -> ExportTarget {
        ExportTarget::Csv
    }

    fn export(&self, text: &str, _map: &OffsetMap) -> Result<Vec<u8>> {
        let mut out = String::with_capacity(text.len() + 16);
        out.push_str(BOM);
        if text.is_empty() {
            return Ok(out.into_bytes());
        }
        for line in text.split('\n') {
            let record: Vec<String> = line.split('\t').map(quote_field).collect();
            out.push_str(&record.join(","));
            out.push_str("\r\n");
        }
        Ok(out.into_bytes())
    }
}

/// Quote a field when it contains a delimiter candidate, a quote, or
/// surrounding whitespace.
fn quote_field(field: &str) -> String {
    let needs_quotes = field.contains([',', ';', '"', '\r'])
        || field.starts_with(char::is_whitespace)
        || field.ends_with(char::is_whitespace);
    if needs_quotes {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting() {
        assert_eq!(quote_field("plain"), "plain");
        assert_eq!(quote_field("a,b"), "\"a,b\"");
        assert_eq!(quote_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_field(" padded"), "\" padded\"");
        assert_eq!(quote_field("x;y"), "\"x;y\"");
    }

    #[test]
    fn test_records() {
        let out = CsvExporter.export("氏名\t住所\n[NAME]\t東京都[ADDRESS]", &OffsetMap::new()).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "\u{feff}氏名,住所\r\n[NAME],東京都[ADDRESS]\r\n");
    }
}
