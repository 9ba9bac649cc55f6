//! Masking engine.
//!
//! [`mask`] rewrites the enabled spans of a text according to each category's
//! [`MaskStrategy`] and records a replacement for every rewritten span, which
//! gives a bidirectional mapping between raw and masked offsets.
//!
//! Replacements are applied right to left over sorted, non-overlapping spans.
//! A span is only replaced when the text under it still equals its
//! `matched_text`, so masking an already-masked text with the same spans is a
//! no-op.

use crate::detect::{Category, DetectionSpan};
use crate::error::{Error, Result};
use crate::offset::NormalizedText;
use crate::policy::{CategoryPolicy, MaskStrategy};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Placeholder appended by the initialize strategy.
pub const INITIALIZE_FILL: &str = "…";

/// One rewritten span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanReplacement {
    /// Span that was replaced
    pub span: DetectionSpan,
    /// Text written in its place
    pub replacement: String,
    /// Byte range of the replacement in the masked text
    pub masked_range: Range<usize>,
}

/// Masked text plus the replacements that produced it, sorted by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskedText {
    /// Masked text
    pub text: String,
    /// Replacements in text order
    pub replacements: Vec<SpanReplacement>,
}

impl MaskedText {
    /// Spans that were masked, in text order.
    pub fn spans(&self) -> impl Iterator<Item = &DetectionSpan> {
        self.replacements.iter().map(|r| &r.span)
    }

    /// Number of masked spans.
    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    /// Whether nothing was masked.
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// Map a raw offset to the masked text. Offsets inside a replaced span map
    /// to the start of its replacement.
    pub fn raw_to_masked(&self, raw: usize) -> usize {
        let mut delta: isize = 0;
        for r in &self.replacements {
            if raw < r.span.start {
                break;
            }
            if raw < r.span.end {
                return r.masked_range.start;
            }
            delta += r.masked_range.len() as isize - r.span.len() as isize;
        }
        (raw as isize + delta).max(0) as usize
    }

    /// Map a masked offset back to the raw text. Offsets inside a replacement
    /// map to the start of the original span.
    pub fn masked_to_raw(&self, masked: usize) -> usize {
        let mut delta: isize = 0;
        for r in &self.replacements {
            if masked < r.masked_range.start {
                break;
            }
            if masked < r.masked_range.end {
                return r.span.start;
            }
            delta += r.span.len() as isize - r.masked_range.len() as isize;
        }
        (masked as isize + delta).max(0) as usize
    }

    /// Replacement covering a masked offset.
    pub fn replacement_at(&self, masked: usize) -> Option<&SpanReplacement> {
        let pos = self
            .replacements
            .partition_point(|r| r.masked_range.end <= masked);
        self.replacements
            .get(pos)
            .filter(|r| r.masked_range.start <= masked)
    }

    /// Fork a free-edit copy. The copy no longer follows policy changes.
    pub fn to_editable(&self) -> EditableText {
        EditableText {
            text: self.text.clone(),
            edits: 0,
        }
    }
}

/// Hand-edited copy of a masked text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditableText {
    text: String,
    edits: usize,
}

impl EditableText {
    /// Current text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of edits applied since the fork.
    pub fn edit_count(&self) -> usize {
        self.edits
    }

    /// Replace a byte range.
    pub fn replace_range(&mut self, range: Range<usize>, with: &str) -> Result<()> {
        if range.start > range.end
            || range.end > self.text.len()
            || !self.text.is_char_boundary(range.start)
            || !self.text.is_char_boundary(range.end)
        {
            return Err(Error::InvalidState(format!(
                "edit range {:?} is not a valid char range of a {}-byte text",
                range,
                self.text.len()
            )));
        }
        self.text.replace_range(range, with);
        self.edits += 1;
        Ok(())
    }

    /// Replace the whole text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.edits += 1;
    }

    /// Consume into the edited string.
    pub fn into_string(self) -> String {
        self.text
    }
}

/// Mask a decoded document.
pub fn mask(text: &NormalizedText, spans: &[DetectionSpan], policy: &CategoryPolicy) -> MaskedText {
    mask_str(&text.text, spans, policy)
}

/// Mask a bare string.
///
/// Spans of disabled categories, spans overlapping an earlier span, and spans
/// whose `matched_text` no longer matches the text are left untouched.
///
/// # Examples
///
/// ```
/// use careermask::detect::{DetectorConfig, KeywordSet, PiiDetector};
/// use careermask::mask::mask_str;
/// use careermask::policy::{CategoryPolicy, Preset};
///
/// let policy = CategoryPolicy::from_preset(Preset::Standard);
/// let text = "Name: Taro Yamada";
/// let spans = PiiDetector::default().detect_str(text, &KeywordSet::new(), &policy).unwrap();
/// let masked = mask_str(text, &spans, &policy);
/// assert_eq!(masked.text, "Name: [NAME]");
/// ```
pub fn mask_str(text: &str, spans: &[DetectionSpan], policy: &CategoryPolicy) -> MaskedText {
    let mut selected: Vec<&DetectionSpan> = spans
        .iter()
        .filter(|s| policy.is_enabled(s.category))
        .filter(|s| !s.is_empty() && text.get(s.start..s.end) == Some(s.matched_text.as_str()))
        .collect();
    selected.sort_by_key(|s| (s.start, s.end));
    let mut disjoint: Vec<&DetectionSpan> = Vec::with_capacity(selected.len());
    for span in selected {
        if disjoint.last().map_or(true, |prev| prev.end <= span.start) {
            disjoint.push(span);
        }
    }

    let replacements: Vec<String> = disjoint
        .iter()
        .map(|span| replacement_for(text, span, policy.strategy(span.category)))
        .collect();

    // Right to left so earlier offsets stay valid
    let mut out = text.to_string();
    for (span, replacement) in disjoint.iter().zip(&replacements).rev() {
        out.replace_range(span.start..span.end, replacement);
    }

    let mut delta: isize = 0;
    let mut records = Vec::with_capacity(disjoint.len());
    for (span, replacement) in disjoint.into_iter().zip(replacements) {
        let start = (span.start as isize + delta) as usize;
        let masked_range = start..start + replacement.len();
        delta += replacement.len() as isize - span.len() as isize;
        records.push(SpanReplacement {
            span: span.clone(),
            replacement,
            masked_range,
        });
    }

    log::debug!("masked {} spans", records.len());
    MaskedText {
        text: out,
        replacements: records,
    }
}

/// Replacement text for one span under `strategy`.
pub fn replacement_for(text: &str, span: &DetectionSpan, strategy: &MaskStrategy) -> String {
    let label = span.category.label();
    match strategy {
        MaskStrategy::FullReplace => label.to_string(),
        MaskStrategy::CustomLiteral(literal) => literal.replace(['\n', '\r'], " "),
        MaskStrategy::Initialize => initialize(&span.matched_text, span.category).unwrap_or_else(|| label.to_string()),
        MaskStrategy::PartialReveal => partial_reveal(text, span).unwrap_or_else(|| label.to_string()),
    }
}

/// Keep the first characters, or `None` when that would reveal everything.
fn initialize(matched: &str, category: Category) -> Option<String> {
    let keep = category.info().initial_chars;
    if matched.chars().count() <= keep {
        return None;
    }
    let prefix: String = matched.chars().take(keep).collect();
    Some(format!("{}{}", prefix, INITIALIZE_FILL))
}

/// Keep the tagged region and replace the rest with the label.
fn partial_reveal(text: &str, span: &DetectionSpan) -> Option<String> {
    let region = span.region.clone()?;
    if region.start < span.start || region.end > span.end || region.len() >= span.len() || region.is_empty() {
        return None;
    }
    let revealed = text.get(region.clone())?;
    let label = span.category.label();
    let mut out = String::new();
    if region.start > span.start {
        out.push_str(label);
    }
    out.push_str(revealed);
    if region.end < span.end {
        out.push_str(label);
    }
    Some(out)
}
