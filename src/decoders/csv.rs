//! CSV / TSV decoder.
//!
//! Each record becomes one line with its fields joined by `\t`. The delimiter
//! (comma, semicolon, or tab) is sniffed from the first record. Quoted fields
//! follow RFC 4180; line breaks inside a quoted field are flattened to a space
//! and reported as a warning.

use super::encoding::decode_text;
use super::{DecodeLimits, DecodeResult, Decoder};
use crate::error::DecodeError;
use crate::format::Format;
use crate::offset::{NormalizedText, Origin, TextBuilder};

/// CSV decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDecoder;

impl Decoder for CsvDecoder {
    fn format(&self) -> Format {
        Format::Csv
    }

    fn decode(&self, bytes: &[u8], _limits: &DecodeLimits) -> DecodeResult<NormalizedText> {
        let (text, warning) = decode_text(bytes);
        let mut builder = TextBuilder::new(Format::Csv);
        if let Some(warning) = warning {
            builder.warn(warning);
        }

        let delimiter = sniff_delimiter(&text);
        let parsed = parse_records(&text, delimiter)?;
        if parsed.flattened_fields > 0 {
            builder.warn(format!(
                "{} multi-line field(s) flattened to a single line",
                parsed.flattened_fields
            ));
        }

        for (row, record) in parsed.records.iter().enumerate() {
            let mut fields: Vec<&str> = record.iter().map(|f| f.as_str()).collect();
            while fields.last().is_some_and(|f| f.is_empty()) {
                fields.pop();
            }
            builder.push_line(&fields.join("\t"), Origin::Record { row });
        }
        builder.trim_trailing_blank_lines();
        Ok(builder.finish())
    }
}

/// Pick the delimiter that occurs most often (outside quotes) in the first record.
fn sniff_delimiter(text: &str) -> char {
    let mut counts = [(',', 0usize), (';', 0), ('\t', 0)];
    let mut in_quotes = false;
    for c in text.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\n' if !in_quotes => break,
            _ if !in_quotes => {
                for entry in counts.iter_mut() {
                    if entry.0 == c {
                        entry.1 += 1;
                    }
                }
            },
            _ => {},
        }
    }
    counts
        .iter()
        .max_by_key(|(_, n)| *n)
        .filter(|(_, n)| *n > 0)
        .map(|(c, _)| *c)
        .unwrap_or(',')
}

struct ParsedCsv {
    records: Vec<Vec<String>>,
    flattened_fields: usize,
}

fn parse_records(text: &str, delimiter: char) -> DecodeResult<ParsedCsv> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;
    let mut field_has_newline = false;
    let mut flattened_fields = 0usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                },
                '"' => in_quotes = false,
                '\n' => {
                    field_has_newline = true;
                    if !field.ends_with(' ') {
                        field.push(' ');
                    }
                },
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() && !field_was_quoted => {
                in_quotes = true;
                field_was_quoted = true;
            },
            '\n' => {
                finish_field(&mut record, &mut field, &mut field_has_newline, &mut flattened_fields);
                field_was_quoted = false;
                records.push(std::mem::take(&mut record));
            },
            c if c == delimiter => {
                finish_field(&mut record, &mut field, &mut field_has_newline, &mut flattened_fields);
                field_was_quoted = false;
            },
            '\t' => field.push(' '),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(DecodeError::corrupt(Format::Csv, "unterminated quoted field"));
    }
    if !field.is_empty() || !record.is_empty() {
        finish_field(&mut record, &mut field, &mut field_has_newline, &mut flattened_fields);
        records.push(record);
    }

    Ok(ParsedCsv {
        records,
        flattened_fields,
    })
}

fn finish_field(
    record: &mut Vec<String>,
    field: &mut String,
    has_newline: &mut bool,
    flattened: &mut usize,
) {
    if *has_newline {
        *flattened += 1;
        *has_newline = false;
    }
    // Tabs are the cell separator in normalized text
    let value = std::mem::take(field).replace('\t', " ");
    record.push(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &str) -> NormalizedText {
        CsvDecoder
            .decode(input.as_bytes(), &DecodeLimits::default())
            .unwrap()
    }

    #[test]
    fn test_simple_csv() {
        let t = decode("name,city\nTaro,Tokyo\n");
        assert_eq!(t.text, "name\tcity\nTaro\tTokyo");
        assert_eq!(t.origin_of(t.text.find("Taro").unwrap()), Some(&Origin::Record { row: 1 }));
    }

    #[test]
    fn test_quoted_fields() {
        let t = decode("\"a, b\",\"say \"\"hi\"\"\"\n");
        assert_eq!(t.text, "a, b\tsay \"hi\"");
    }

    #[test]
    fn test_semicolon_delimiter() {
        let t = decode("a;b;c\n1;2;3");
        assert_eq!(t.text, "a\tb\tc\n1\t2\t3");
    }

    #[test]
    fn test_multiline_field_flattened_with_warning() {
        let t = decode("\"line1\nline2\",x\n");
        assert_eq!(t.text, "line1 line2\tx");
        assert_eq!(t.warnings.len(), 1);
    }

    #[test]
    fn test_unterminated_quote_is_corrupt() {
        let err = CsvDecoder
            .decode(b"\"open,field\n", &DecodeLimits::default())
            .unwrap_err();
        assert_eq!(err.kind, crate::error::DecodeErrorKind::Corrupt);
    }

    #[test]
    fn test_trailing_empty_fields_trimmed() {
        let t = decode("a,b,,\n");
        assert_eq!(t.text, "a\tb");
    }
}
