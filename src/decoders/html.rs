//! HTML decoder.
//!
//! Walks the parsed DOM and emits one line per block-level element. Table
//! cells are joined by `\t`, list items get a `- ` marker, `<br>` starts a new
//! line, and whitespace inside inline content is collapsed (except in `<pre>`).
//! Scripts, styles, templates, and the document head are dropped.

use super::encoding::decode_text;
use super::{DecodeLimits, DecodeResult, Decoder};
use crate::format::Format;
use crate::offset::{NormalizedText, Origin, TextBuilder};
use scraper::{ElementRef, Html};

/// HTML decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlDecoder;

const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "head", "svg", "iframe", "object"];

const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "tbody", "thead", "tfoot", "tr", "ul", "caption",
    "body", "html", "title",
];

impl Decoder for HtmlDecoder {
    fn format(&self) -> Format {
        Format::Html
    }

    fn decode(&self, bytes: &[u8], _limits: &DecodeLimits) -> DecodeResult<NormalizedText> {
        let (source, warning) = decode_text(bytes);
        let mut builder = TextBuilder::new(Format::Html);
        if let Some(warning) = warning {
            builder.warn(warning);
        }
        for (index, line) in html_blocks(&source).into_iter().enumerate() {
            builder.push_line(&line, Origin::Block { index });
        }
        builder.trim_trailing_blank_lines();
        Ok(builder.finish())
    }
}

/// Convert HTML to plain text (one block per line).
///
/// Used by the fetch proxy to sanitize remote pages.
pub fn html_to_text(source: &str) -> String {
    html_blocks(source).join("\n")
}

fn html_blocks(source: &str) -> Vec<String> {
    let document = Html::parse_document(source);
    let mut walker = BlockWalker::default();
    walker.walk(document.root_element(), false);
    walker.flush();
    walker.blocks
}

#[derive(Default)]
struct BlockWalker {
    blocks: Vec<String>,
    current: String,
    cells: Vec<String>,
    in_row: bool,
}

impl BlockWalker {
    fn walk(&mut self, element: ElementRef<'_>, preformatted: bool) {
        let name = element.value().name();
        if SKIPPED.contains(&name) {
            return;
        }
        let is_block = BLOCKS.contains(&name);
        let preformatted = preformatted || name == "pre";

        match name {
            "br" => {
                self.break_line();
                return;
            },
            "tr" => {
                self.flush();
                self.in_row = true;
            },
            "td" | "th" if self.in_row => {
                self.current = std::mem::take(&mut self.current).trim().to_string();
                if !self.current.is_empty() {
                    self.cells.push(std::mem::take(&mut self.current));
                }
            },
            _ if is_block => self.flush(),
            _ => {},
        }
        if name == "li" {
            self.current.push_str("- ");
        }

        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                self.walk(child_element, preformatted);
            } else if let Some(text) = child.value().as_text() {
                self.push_text(text, preformatted);
            }
        }

        match name {
            "td" | "th" if self.in_row => {
                let cell = collapse(&std::mem::take(&mut self.current));
                self.cells.push(cell);
            },
            "tr" => {
                let row = std::mem::take(&mut self.cells);
                self.in_row = false;
                let line = trim_trailing_empty(row).join("\t");
                if !line.trim().is_empty() {
                    self.blocks.push(line);
                }
            },
            _ if is_block => self.flush(),
            _ => {},
        }
    }

    fn push_text(&mut self, text: &str, preformatted: bool) {
        if preformatted {
            for (i, piece) in text.split('\n').enumerate() {
                if i > 0 {
                    self.break_line();
                }
                self.current.push_str(piece);
            }
        } else {
            let collapsed = collapse_inline(text);
            if collapsed.is_empty() {
                return;
            }
            if collapsed == " " {
                if !self.current.is_empty() && !self.current.ends_with(' ') {
                    self.current.push(' ');
                }
                return;
            }
            if (self.current.is_empty() || self.current.ends_with(' ')) && collapsed.starts_with(' ') {
                self.current.push_str(&collapsed[1..]);
            } else {
                self.current.push_str(&collapsed);
            }
        }
    }

    fn break_line(&mut self) {
        if self.in_row {
            self.current.push(' ');
            return;
        }
        let line = std::mem::take(&mut self.current);
        self.blocks.push(line.trim_end().to_string());
    }

    fn flush(&mut self) {
        if self.in_row {
            return;
        }
        let line = collapse(&std::mem::take(&mut self.current));
        if !line.is_empty() {
            self.blocks.push(line);
        }
    }
}

fn trim_trailing_empty(mut cells: Vec<String>) -> Vec<String> {
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

/// Collapse whitespace runs to single spaces, keeping a leading/trailing space marker.
fn collapse_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        if c.is_whitespace() && c != '\u{3000}' && c != '\u{a0}' {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

fn collapse(text: &str) -> String {
    collapse_inline(text).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(html: &str) -> NormalizedText {
        HtmlDecoder
            .decode(html.as_bytes(), &DecodeLimits::default())
            .unwrap()
    }

    #[test]
    fn test_blocks_become_lines() {
        let t = decode("<html><body><h1>Taro  Yamada</h1><p>Software\n engineer</p></body></html>");
        assert_eq!(t.text, "Taro Yamada\nSoftware engineer");
        assert_eq!(t.origin_of(t.text.find("Software").unwrap()), Some(&Origin::Block { index: 1 }));
    }

    #[test]
    fn test_scripts_and_styles_dropped() {
        let t = decode("<html><head><title>x</title><style>p{}</style></head><body><script>var a;</script><p>kept</p></body></html>");
        assert_eq!(t.text, "kept");
    }

    #[test]
    fn test_table_rows_tab_separated() {
        let t = decode("<table><tr><th>Name</th><td>Taro</td></tr><tr><th>City</th><td>Tokyo</td></tr></table>");
        assert_eq!(t.text, "Name\tTaro\nCity\tTokyo");
    }

    #[test]
    fn test_lists_and_breaks() {
        let t = decode("<ul><li>Rust</li><li>Go</li></ul><p>a<br>b</p>");
        assert_eq!(t.text, "- Rust\n- Go\na\nb");
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(html_to_text("<div>one</div><div>two</div>"), "one\ntwo");
    }
}
