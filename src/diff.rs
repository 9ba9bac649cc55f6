//! Diff segments for the diff views.
//!
//! Two algorithms produce the same [`DiffSegment`] shape:
//! - [`diff`] walks the replacement list of a [`MaskedText`], so raw and masked
//!   text stay aligned exactly no matter how long each replacement is.
//! - [`text_diff`] compares two unrelated texts (masked vs AI rewrite) with a
//!   token-level longest common subsequence, falling back to whole lines when
//!   the inputs are too large for the token table.

use crate::detect::Category;
use crate::mask::MaskedText;
use serde::{Deserialize, Serialize};

/// Largest LCS table (cells) computed before coarsening the tokens.
pub const MAX_LCS_CELLS: usize = 4_000_000;

/// One run of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DiffSegment {
    /// Text present on both sides
    Unchanged {
        /// Shared text
        text: String,
    },
    /// Text that differs. Either side may be empty for a pure insertion or
    /// deletion.
    Replaced {
        /// Left-hand text
        before: String,
        /// Right-hand text
        after: String,
        /// Category of the masked span, for span-anchored diffs
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<Category>,
    },
}

impl DiffSegment {
    /// Text on the left-hand side.
    pub fn before(&self) -> &str {
        match self {
            DiffSegment::Unchanged { text } => text,
            DiffSegment::Replaced { before, .. } => before,
        }
    }

    /// Text on the right-hand side.
    pub fn after(&self) -> &str {
        match self {
            DiffSegment::Unchanged { text } => text,
            DiffSegment::Replaced { after, .. } => after,
        }
    }

    /// Whether this is a replaced run.
    pub fn is_replaced(&self) -> bool {
        matches!(self, DiffSegment::Replaced { .. })
    }
}

/// Concatenate the left-hand side.
pub fn before_text(segments: &[DiffSegment]) -> String {
    segments.iter().map(DiffSegment::before).collect()
}

/// Concatenate the right-hand side.
pub fn after_text(segments: &[DiffSegment]) -> String {
    segments.iter().map(DiffSegment::after).collect()
}

/// Number of replaced runs.
pub fn replaced_count(segments: &[DiffSegment]) -> usize {
    segments.iter().filter(|s| s.is_replaced()).count()
}

/// Render segments inline: `[-before-]{+after+}` around every change.
pub fn render_inline(segments: &[DiffSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            DiffSegment::Unchanged { text } => out.push_str(text),
            DiffSegment::Replaced { before, after, .. } => {
                if !before.is_empty() {
                    out.push_str("[-");
                    out.push_str(before);
                    out.push_str("-]");
                }
                if !after.is_empty() {
                    out.push_str("{+");
                    out.push_str(after);
                    out.push_str("+}");
                }
            }
        }
    }
    out
}

/// Span-anchored diff between `raw` and its masked rendition.
///
/// Segments are emitted directly from the replacement boundaries, so
/// [`before_text`] gives back `raw` and [`after_text`] gives back
/// `masked.text`.
///
/// # Examples
///
/// ```
/// use careermask::detect::{KeywordSet, PiiDetector};
/// use careermask::diff::{after_text, before_text, diff, replaced_count};
/// use careermask::mask::mask_str;
/// use careermask::policy::{CategoryPolicy, Preset};
///
/// let raw = "Name: Taro Yamada\nEmail: taro@example.com";
/// let policy = CategoryPolicy::from_preset(Preset::Basic);
/// let spans = PiiDetector::default().detect_str(raw, &KeywordSet::new(), &policy).unwrap();
/// let masked = mask_str(raw, &spans, &policy);
/// let segments = diff(raw, &masked);
/// assert_eq!(replaced_count(&segments), 2);
/// assert_eq!(before_text(&segments), raw);
/// assert_eq!(after_text(&segments), masked.text);
/// ```
pub fn diff(raw: &str, masked: &MaskedText) -> Vec<DiffSegment> {
    let mut segments = Vec::with_capacity(masked.replacements.len() * 2 + 1);
    let mut cursor = 0;
    for r in &masked.replacements {
        if r.span.start > cursor {
            segments.push(DiffSegment::Unchanged {
                text: raw[cursor..r.span.start].to_string(),
            });
        }
        segments.push(DiffSegment::Replaced {
            before: raw[r.span.start..r.span.end].to_string(),
            after: r.replacement.clone(),
            category: Some(r.span.category),
        });
        cursor = r.span.end;
    }
    if cursor < raw.len() {
        segments.push(DiffSegment::Unchanged {
            text: raw[cursor..].to_string(),
        });
    }
    segments
}

/// Textual diff between two unrelated texts.
pub fn text_diff(before: &str, after: &str) -> Vec<DiffSegment> {
    text_diff_with_limit(before, after, MAX_LCS_CELLS)
}

/// [`text_diff`] with an explicit table budget.
pub fn text_diff_with_limit(before: &str, after: &str, max_cells: usize) -> Vec<DiffSegment> {
    let a = tokenize(before);
    let b = tokenize(after);
    let mut builder = SegmentBuilder::default();
    if fits(&a, &b, max_cells) {
        diff_units(&a, &b, max_cells, &mut builder);
    } else {
        log::debug!(
            "token diff of {}x{} exceeds budget, diffing lines",
            a.len(),
            b.len()
        );
        let a: Vec<&str> = before.split_inclusive('\n').collect();
        let b: Vec<&str> = after.split_inclusive('\n').collect();
        diff_units(&a, &b, max_cells, &mut builder);
    }
    builder.finish()
}

fn fits(a: &[&str], b: &[&str], max_cells: usize) -> bool {
    let (prefix, suffix) = common_ends(a, b);
    let n = a.len() - prefix - suffix;
    let m = b.len() - prefix - suffix;
    n.saturating_mul(m) <= max_cells
}

fn common_ends(a: &[&str], b: &[&str]) -> (usize, usize) {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    (prefix, suffix)
}

fn diff_units(a: &[&str], b: &[&str], max_cells: usize, out: &mut SegmentBuilder) {
    let (prefix, suffix) = common_ends(a, b);
    for unit in &a[..prefix] {
        out.equal(unit);
    }
    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];
    let n = mid_a.len();
    let m = mid_b.len();

    if n.saturating_mul(m) > max_cells || n == 0 || m == 0 {
        // Too large even for lines, or one side empty: one block
        for unit in mid_a {
            out.delete(unit);
        }
        for unit in mid_b {
            out.insert(unit);
        }
    } else {
        let width = m + 1;
        let mut table = vec![0u32; (n + 1) * width];
        for i in (0..n).rev() {
            for j in (0..m).rev() {
                table[i * width + j] = if mid_a[i] == mid_b[j] {
                    table[(i + 1) * width + j + 1] + 1
                } else {
                    table[(i + 1) * width + j].max(table[i * width + j + 1])
                };
            }
        }
        let (mut i, mut j) = (0, 0);
        while i < n && j < m {
            if mid_a[i] == mid_b[j] {
                out.equal(mid_a[i]);
                i += 1;
                j += 1;
            } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
                out.delete(mid_a[i]);
                i += 1;
            } else {
                out.insert(mid_b[j]);
                j += 1;
            }
        }
        for unit in &mid_a[i..] {
            out.delete(unit);
        }
        for unit in &mid_b[j..] {
            out.insert(unit);
        }
    }

    for unit in &a[a.len() - suffix..] {
        out.equal(unit);
    }
}

/// Split into words, whitespace runs, and single other characters (so CJK
/// text diffs per character).
fn tokenize(text: &str) -> Vec<&str> {
    #[derive(PartialEq, Clone, Copy)]
    enum Class {
        Word,
        Space,
        Other,
    }
    fn class(c: char) -> Class {
        if c.is_ascii_alphanumeric() || c == '_' {
            Class::Word
        } else if c.is_whitespace() {
            Class::Space
        } else {
            Class::Other
        }
    }

    let mut tokens = Vec::new();
    let mut start = 0;
    let mut current: Option<Class> = None;
    for (i, c) in text.char_indices() {
        let cls = class(c);
        match current {
            Some(prev) if prev == cls && cls != Class::Other => {}
            Some(_) => {
                tokens.push(&text[start..i]);
                start = i;
            }
            None => {}
        }
        current = Some(cls);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// Collects equal/delete/insert units into coalesced segments.
#[derive(Default)]
struct SegmentBuilder {
    segments: Vec<DiffSegment>,
    equal: String,
    before: String,
    after: String,
}

impl SegmentBuilder {
    fn equal(&mut self, unit: &str) {
        self.flush_change();
        self.equal.push_str(unit);
    }

    fn delete(&mut self, unit: &str) {
        self.flush_equal();
        self.before.push_str(unit);
    }

    fn insert(&mut self, unit: &str) {
        self.flush_equal();
        self.after.push_str(unit);
    }

    fn flush_equal(&mut self) {
        if !self.equal.is_empty() {
            self.segments.push(DiffSegment::Unchanged {
                text: std::mem::take(&mut self.equal),
            });
        }
    }

    fn flush_change(&mut self) {
        if !self.before.is_empty() || !self.after.is_empty() {
            self.segments.push(DiffSegment::Replaced {
                before: std::mem::take(&mut self.before),
                after: std::mem::take(&mut self.after),
                category: None,
            });
        }
    }

    fn finish(mut self) -> Vec<DiffSegment> {
        self.flush_change();
        self.flush_equal();
        self.segments
    }
}
