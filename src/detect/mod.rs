//! PII detection.
//!
//! Detection has two phases:
//! - [`PiiDetector::scan`] runs every pattern rule plus the custom keyword set
//!   over the text and returns all raw candidates. This is the expensive part
//!   and depends only on the text and the keywords.
//! - [`resolve`] turns candidates into final spans for a policy: disabled
//!   categories are dropped, overlaps are resolved span-for-span by category
//!   priority then length, and adjacent same-category spans are merged where
//!   the category table asks for it.
//!
//! [`PiiDetector::detect`] is `resolve(scan(..))`. The view layer caches the
//! scan result so category toggles only re-run `resolve`.

mod category;
mod keywords;
mod rules;

pub use category::{Category, CategoryInfo, CATEGORY_TABLE};
pub use keywords::KeywordSet;

use crate::error::DetectionError;
use crate::offset::NormalizedText;
use crate::policy::CategoryPolicy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

/// One detected PII occurrence.
///
/// `start..end` is a half-open byte range into the normalized text (always on
/// char boundaries, never containing a line break).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSpan {
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// Category
    pub category: Category,
    /// Text covered by the span
    pub matched_text: String,
    /// Rule confidence in `0.0..=1.0`
    pub confidence: f32,
    /// Rule that produced the span
    pub rule: String,
    /// Sub-range kept by partial-reveal masking (absolute offsets)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Range<usize>>,
}

impl DetectionSpan {
    /// Byte range of the span.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span is zero-length.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether two spans share at least one byte.
    pub fn overlaps(&self, other: &DetectionSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Overlap-resolution order, highest priority first. Categories missing
    /// from the list rank after the listed ones; `custom-keyword` always ranks
    /// last.
    pub priority: Vec<Category>,
    /// Candidates below this confidence are discarded
    pub min_confidence: f32,
    /// Upper bound on the custom keyword set size
    pub max_keywords: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            priority: Category::ALL.to_vec(),
            min_confidence: 0.0,
            max_keywords: 2000,
        }
    }
}

impl DetectorConfig {
    /// Priority rank of `category` (lower wins).
    pub fn rank(&self, category: Category) -> usize {
        if category == Category::CustomKeyword {
            return usize::MAX;
        }
        self.priority
            .iter()
            .position(|c| *c == category)
            .unwrap_or(self.priority.len() + category.info_index())
    }

    /// Builder: set the priority order.
    pub fn with_priority(mut self, priority: Vec<Category>) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set the confidence floor.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }
}

impl Category {
    fn info_index(&self) -> usize {
        Category::ALL.iter().position(|c| c == self).unwrap_or(Category::ALL.len())
    }
}

/// Every candidate found in one text, before policy resolution.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    text: Arc<str>,
    candidates: Vec<DetectionSpan>,
}

impl CandidateSet {
    /// Text the candidates were found in.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// All candidates, sorted by start.
    pub fn candidates(&self) -> &[DetectionSpan] {
        &self.candidates
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether nothing was found.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Rule-based PII detector.
///
/// # Examples
///
/// ```
/// use careermask::detect::{DetectorConfig, KeywordSet, PiiDetector};
/// use careermask::policy::{CategoryPolicy, Preset};
///
/// let detector = PiiDetector::new(DetectorConfig::default());
/// let spans = detector
///     .detect_str("Name: Taro Yamada\nEmail: taro@example.com", &KeywordSet::new(), &CategoryPolicy::from_preset(Preset::Basic))
///     .unwrap();
/// assert_eq!(spans.len(), 2);
/// assert_eq!(spans[0].matched_text, "Taro Yamada");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PiiDetector {
    config: DetectorConfig,
}

impl PiiDetector {
    /// Create a detector.
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Detector settings.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Find every candidate in `text`.
    ///
    /// Fails only if the keyword set cannot be compiled.
    pub fn scan(&self, text: &str, keywords: &KeywordSet) -> Result<CandidateSet, DetectionError> {
        let keyword_regex = keywords.compile(self.config.max_keywords)?;
        let mut candidates = Vec::new();

        for rule in rules::RULES.iter() {
            for caps in rule.regex.captures_iter(text) {
                let value = match caps.name("value").or_else(|| caps.get(0)) {
                    Some(m) => m,
                    None => continue,
                };
                if let Some(validate) = rule.validate {
                    if !validate(value.as_str()) {
                        continue;
                    }
                }
                let region = caps.name("region").map(|m| m.range());
                push_candidate(
                    &mut candidates,
                    text,
                    value.range(),
                    rule.category,
                    rule.confidence,
                    rule.id,
                    region,
                );
            }
        }

        push_echo_candidates(&mut candidates, text);

        if let Some(re) = keyword_regex {
            push_keyword_candidates(&mut candidates, text, &re);
        }

        candidates.retain(|c| c.confidence >= self.config.min_confidence);
        candidates.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        log::debug!("scan found {} candidate spans", candidates.len());

        Ok(CandidateSet {
            text: Arc::from(text),
            candidates,
        })
    }

    /// Resolve candidates for `policy` (see [`resolve`]).
    pub fn resolve(&self, candidates: &CandidateSet, policy: &CategoryPolicy) -> Vec<DetectionSpan> {
        resolve(candidates, policy, &self.config)
    }

    /// Scan and resolve in one step.
    pub fn detect(
        &self,
        text: &NormalizedText,
        keywords: &KeywordSet,
        policy: &CategoryPolicy,
    ) -> Result<Vec<DetectionSpan>, DetectionError> {
        self.detect_str(&text.text, keywords, policy)
    }

    /// Scan and resolve a bare string.
    pub fn detect_str(
        &self,
        text: &str,
        keywords: &KeywordSet,
        policy: &CategoryPolicy,
    ) -> Result<Vec<DetectionSpan>, DetectionError> {
        let candidates = self.scan(text, keywords)?;
        Ok(self.resolve(&candidates, policy))
    }
}

/// Distinct rule values looked up again as literals
const MAX_ECHO_VALUES: usize = 256;
/// Shorter values are too ambiguous to repeat
const MIN_ECHO_CHARS: usize = 2;
/// Confidence factor for repeated occurrences
const ECHO_CONFIDENCE: f32 = 0.9;

/// Add every further occurrence of a value a rule already found, e.g. a name
/// repeated in the body after its labelled first appearance.
fn push_echo_candidates(candidates: &mut Vec<DetectionSpan>, text: &str) {
    let mut sources: HashMap<String, usize> = HashMap::new();
    for (index, c) in candidates.iter().enumerate() {
        if sources.len() >= MAX_ECHO_VALUES {
            break;
        }
        if c.matched_text.chars().count() >= MIN_ECHO_CHARS {
            sources.entry(c.matched_text.clone()).or_insert(index);
        }
    }
    if sources.is_empty() {
        return;
    }

    let mut values: Vec<&String> = sources.keys().collect();
    values.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let pattern = values.iter().map(|v| regex::escape(v)).collect::<Vec<_>>().join("|");
    let re = match regex::RegexBuilder::new(&pattern).size_limit(16 * 1024 * 1024).build() {
        Ok(re) => re,
        Err(e) => {
            log::warn!("skipping repeated-value lookup: {}", e);
            return;
        }
    };

    let existing: HashSet<(usize, usize)> = candidates.iter().map(|c| (c.start, c.end)).collect();
    let mut echoes = Vec::new();
    for m in re.find_iter(text) {
        if existing.contains(&(m.start(), m.end())) || splits_word(text, m.range()) {
            continue;
        }
        let source = match sources.get(m.as_str()) {
            Some(&index) => &candidates[index],
            None => continue,
        };
        let region = source
            .region
            .as_ref()
            .map(|r| m.start() + (r.start - source.start)..m.start() + (r.end - source.start));
        push_candidate(
            &mut echoes,
            text,
            m.range(),
            source.category,
            source.confidence * ECHO_CONFIDENCE,
            &format!("{}.repeat", source.rule),
            region,
        );
    }
    candidates.extend(echoes);
}

/// Whether `range` starts or ends inside an ASCII word.
fn splits_word(text: &str, range: Range<usize>) -> bool {
    let is_word = |c: char| c.is_ascii_alphanumeric();
    let inner_start = text[range.clone()].chars().next().is_some_and(is_word);
    let inner_end = text[range.clone()].chars().next_back().is_some_and(is_word);
    let before = text[..range.start].chars().next_back().is_some_and(is_word);
    let after = text[range.end..].chars().next().is_some_and(is_word);
    (inner_start && before) || (inner_end && after)
}

fn push_keyword_candidates(candidates: &mut Vec<DetectionSpan>, text: &str, re: &Regex) {
    for m in re.find_iter(text) {
        push_candidate(
            candidates,
            text,
            m.range(),
            Category::CustomKeyword,
            1.0,
            "custom-keyword",
            None,
        );
    }
}

fn is_horizontal_space(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\u{3000}' || c == '\u{a0}'
}

/// Trim surrounding whitespace and record the candidate if anything is left.
fn push_candidate(
    candidates: &mut Vec<DetectionSpan>,
    text: &str,
    range: Range<usize>,
    category: Category,
    confidence: f32,
    rule: &str,
    region: Option<Range<usize>>,
) {
    let raw = &text[range.clone()];
    let leading = raw.len() - raw.trim_start_matches(is_horizontal_space).len();
    let trimmed = raw.trim_matches(is_horizontal_space);
    let start = range.start + leading;
    let end = start + trimmed.len();
    if start >= end || trimmed.contains('\n') {
        return;
    }
    let region = region
        .map(|r| r.start.max(start)..r.end.min(end))
        .filter(|r| r.start < r.end);
    candidates.push(DetectionSpan {
        start,
        end,
        category,
        matched_text: trimmed.to_string(),
        confidence,
        rule: rule.to_string(),
        region,
    });
}

/// Resolve candidates into the final spans for `policy`.
///
/// 1. Spans of disabled categories are discarded.
/// 2. Overlaps are resolved greedily: higher category priority first, then
///    longer span, then earlier start. A losing span is dropped whole.
/// 3. Same-category neighbours separated only by spaces, tabs or U+3000 are
///    merged when the category is marked `merge_adjacent`.
///
/// The result is sorted by start and pairwise non-overlapping.
pub fn resolve(
    candidates: &CandidateSet,
    policy: &CategoryPolicy,
    config: &DetectorConfig,
) -> Vec<DetectionSpan> {
    let text = candidates.text();
    let mut pool: Vec<&DetectionSpan> = candidates
        .candidates
        .iter()
        .filter(|c| policy.is_enabled(c.category))
        .collect();
    pool.sort_by(|a, b| {
        config
            .rank(a.category)
            .cmp(&config.rank(b.category))
            .then(b.len().cmp(&a.len()))
            .then(a.start.cmp(&b.start))
            .then(b.confidence.total_cmp(&a.confidence))
    });

    // Accepted spans keyed by start; they never overlap each other
    let mut accepted: BTreeMap<usize, &DetectionSpan> = BTreeMap::new();
    for span in pool {
        let clash = accepted
            .range(..span.end)
            .next_back()
            .is_some_and(|(_, prev)| prev.end > span.start);
        if !clash {
            accepted.insert(span.start, span);
        }
    }

    let mut spans: Vec<DetectionSpan> = Vec::with_capacity(accepted.len());
    for span in accepted.into_values() {
        if let Some(last) = spans.last_mut() {
            if last.category == span.category
                && span.category.info().merge_adjacent
                && text[last.end..span.start].chars().all(|c| c == ' ' || c == '\t' || c == '\u{3000}')
            {
                last.end = span.end;
                last.matched_text = text[last.start..last.end].to_string();
                last.confidence = last.confidence.min(span.confidence);
                if last.region.is_none() {
                    last.region = span.region.clone();
                }
                continue;
            }
        }
        spans.push(span.clone());
    }

    log::debug!("resolved {} candidates into {} spans", candidates.len(), spans.len());
    spans
}

/// Count spans per category.
pub fn summarize(spans: &[DetectionSpan]) -> BTreeMap<Category, usize> {
    let mut summary = BTreeMap::new();
    for span in spans {
        *summary.entry(span.category).or_insert(0) += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Preset;

    fn strict() -> CategoryPolicy {
        CategoryPolicy::from_preset(Preset::Strict)
    }

    fn detect(text: &str, keywords: &KeywordSet, policy: &CategoryPolicy) -> Vec<DetectionSpan> {
        PiiDetector::default().detect_str(text, keywords, policy).unwrap()
    }

    #[test]
    fn test_labelled_fields() {
        let text = "氏名：山田 太郎\n住所：東京都千代田区千代田1-1\nメール：taro@example.jp";
        let spans = detect(text, &KeywordSet::new(), &strict());
        let cats: Vec<Category> = spans.iter().map(|s| s.category).collect();
        assert_eq!(cats, vec![Category::Name, Category::Address, Category::Email]);
        assert_eq!(spans[0].matched_text, "山田 太郎");
        assert_eq!(spans[1].matched_text, "東京都千代田区千代田1-1");
        assert_eq!(&text[spans[1].region.clone().unwrap()], "東京都");
    }

    #[test]
    fn test_disabled_categories_never_reported() {
        let text = "Name: Taro Yamada\nEmail: taro@example.com";
        let mut policy = strict();
        policy.set_enabled(Category::Email, false);
        let spans = detect(text, &KeywordSet::new(), &policy);
        assert!(spans.iter().all(|s| s.category != Category::Email));
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn test_priority_beats_length() {
        // Same range as the name rule; names outrank keywords
        let text = "Name: Taro Yamada";
        let keywords = KeywordSet::from_keywords(["Taro Yamada"], false);
        let spans = detect(text, &keywords, &strict());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].category, Category::Name);
    }

    #[test]
    fn test_keyword_wins_when_alone() {
        let spans = detect("Led Project Phoenix.", &KeywordSet::from_keywords(["project phoenix"], true), &strict());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].category, Category::CustomKeyword);
        assert_eq!(spans[0].matched_text, "Project Phoenix");
    }

    #[test]
    fn test_configurable_priority() {
        let text = "x Acme Labs Inc. y";
        let keywords = KeywordSet::from_keywords(["Acme Labs Inc."], false);
        let config = DetectorConfig::default();
        assert!(config.rank(Category::Organization) < config.rank(Category::CustomKeyword));
        let spans = detect(text, &keywords, &strict());
        assert_eq!(spans[0].category, Category::Organization);
    }

    #[test]
    fn test_merge_adjacent_names() {
        let text = "Team: Taro\u{3000}Yamada";
        let keywords = KeywordSet::from_keywords(["Taro", "Yamada"], false);
        // Keywords do not merge
        let spans = detect(text, &keywords, &strict());
        assert_eq!(spans.len(), 2);

        let candidates = CandidateSet {
            text: Arc::from(text),
            candidates: vec![
                DetectionSpan {
                    start: 6,
                    end: 10,
                    category: Category::Name,
                    matched_text: "Taro".into(),
                    confidence: 0.9,
                    rule: "test".into(),
                    region: None,
                },
                DetectionSpan {
                    start: 13,
                    end: 19,
                    category: Category::Name,
                    matched_text: "Yamada".into(),
                    confidence: 0.8,
                    rule: "test".into(),
                    region: None,
                },
            ],
        };
        let merged = resolve(&candidates, &strict(), &DetectorConfig::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].matched_text, "Taro\u{3000}Yamada");
        assert_eq!(merged[0].confidence, 0.8);
    }

    #[test]
    fn test_no_merge_across_newline() {
        let text = "Taro\nYamada";
        let candidates = CandidateSet {
            text: Arc::from(text),
            candidates: vec![
                DetectionSpan {
                    start: 0,
                    end: 4,
                    category: Category::Name,
                    matched_text: "Taro".into(),
                    confidence: 0.9,
                    rule: "test".into(),
                    region: None,
                },
                DetectionSpan {
                    start: 5,
                    end: 11,
                    category: Category::Name,
                    matched_text: "Yamada".into(),
                    confidence: 0.9,
                    rule: "test".into(),
                    region: None,
                },
            ],
        };
        assert_eq!(resolve(&candidates, &strict(), &DetectorConfig::default()).len(), 2);
    }

    #[test]
    fn test_spans_sorted_and_disjoint() {
        let text = "Name: Taro Yamada\nTEL 03-1234-5678 / +81 3 1234 5678\nhttps://example.com/taro taro@example.com\n1234-5678-9012";
        let spans = detect(text, &KeywordSet::from_keywords(["Taro"], false), &strict());
        for pair in spans.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        for span in &spans {
            assert_eq!(&text[span.range()], span.matched_text);
            assert!(!span.matched_text.contains('\n'));
        }
    }

    #[test]
    fn test_scan_is_deterministic() {
        let text = "氏名：山田 太郎 生年月日：1990年4月1日";
        let a = detect(text, &KeywordSet::new(), &strict());
        let b = detect(text, &KeywordSet::new(), &strict());
        assert_eq!(a, b);
    }

    #[test]
    fn test_repeated_value_detected() {
        let text = "氏名：山田 太郎\n自己PR：山田 太郎として貢献します";
        let spans = detect(text, &KeywordSet::new(), &strict());
        let names: Vec<&DetectionSpan> = spans.iter().filter(|s| s.category == Category::Name).collect();
        assert_eq!(names.len(), 2);
        assert!(names[1].rule.ends_with(".repeat"));
        assert!(names[1].confidence < names[0].confidence);
    }

    #[test]
    fn test_summarize() {
        let spans = detect("a@example.com b@example.com", &KeywordSet::new(), &strict());
        assert_eq!(summarize(&spans).get(&Category::Email), Some(&2));
    }
}
