//! Plain text and Markdown exporters.

use super::{lines_with_origins, ExportTarget, Exporter};
use crate::error::Result;
use crate::offset::{OffsetMap, Origin};

/// UTF-8 text, one trailing newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExporter;

impl Exporter for PlainTextExporter {
    fn target(&self) -> ExportTarget {
        ExportTarget::PlainText
    }

    fn export(&self, text: &str, _map: &OffsetMap) -> Result<Vec<u8>> {
        let mut out = text.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}

/// Markdown.
///
/// Text and Markdown sources are written verbatim. Structured sources get
/// light markup: sheet names become headings, tab-separated rows become pipe
/// tables, and paragraphs are separated by blank lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownExporter;

impl Exporter for MarkdownExporter {
    fn target(&self) -> ExportTarget {
        ExportTarget::Markdown
    }

    fn export(&self, text: &str, map: &OffsetMap) -> Result<Vec<u8>> {
        let mut out = String::with_capacity(text.len() + text.len() / 8);
        let mut table: Option<TableKey> = None;

        for (line, origin) in lines_with_origins(text, map) {
            let key = origin.and_then(table_key);
            match key {
                Some(k) if line.contains('\t') || table == Some(k) => {
                    let cells: Vec<String> = line.split('\t').map(escape_cell).collect();
                    out.push_str("| ");
                    out.push_str(&cells.join(" | "));
                    out.push_str(" |\n");
                    if table != Some(k) {
                        out.push('|');
                        for _ in &cells {
                            out.push_str(" --- |");
                        }
                        out.push('\n');
                        table = Some(k);
                    }
                    continue;
                },
                _ => {},
            }
            if table.take().is_some() {
                out.push('\n');
            }
            match origin {
                Some(Origin::SheetName { .. }) => {
                    out.push_str("## ");
                    out.push_str(line);
                    out.push_str("\n\n");
                },
                Some(Origin::Paragraph { .. }) | Some(Origin::Block { .. }) if !line.is_empty() => {
                    out.push_str(line);
                    out.push_str("\n\n");
                },
                _ => {
                    out.push_str(line);
                    out.push('\n');
                },
            }
        }

        while out.ends_with("\n\n") {
            out.pop();
        }
        Ok(out.into_bytes())
    }
}

/// Identity of one table in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKey {
    Sheet(usize),
    Table(usize),
    Csv,
}

fn table_key(origin: &Origin) -> Option<TableKey> {
    match origin {
        Origin::Cell { sheet, .. } => Some(TableKey::Sheet(*sheet)),
        Origin::TableRow { table, .. } => Some(TableKey::Table(*table)),
        Origin::Record { .. } => Some(TableKey::Csv),
        _ => None,
    }
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|")
}
