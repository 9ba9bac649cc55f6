//! Integration tests for PII detection and masking.

use careermask::detect::{summarize, Category, DetectorConfig, KeywordSet, PiiDetector};
use careermask::mask::{mask_str, INITIALIZE_FILL};
use careermask::policy::{CategoryPolicy, MaskStrategy, Preset};

const RESUME: &str = "氏名：山田 太郎\n住所：東京都千代田区千代田1-1\nメール：taro@example.jp\nTEL 03-1234-5678";

fn detect(text: &str, keywords: &KeywordSet, policy: &CategoryPolicy) -> Vec<careermask::DetectionSpan> {
    PiiDetector::default().detect_str(text, keywords, policy).unwrap()
}

#[test]
fn test_japanese_resume_standard_preset() {
    let policy = CategoryPolicy::from_preset(Preset::Standard);
    let spans = detect(RESUME, &KeywordSet::new(), &policy);
    let categories: Vec<Category> = spans.iter().map(|s| s.category).collect();
    assert_eq!(
        categories,
        vec![Category::Name, Category::Address, Category::Email, Category::Phone]
    );

    let masked = mask_str(RESUME, &spans, &policy);
    assert_eq!(masked.text, "氏名：[NAME]\n住所：[ADDRESS]\nメール：[EMAIL]\nTEL [PHONE]");
}

#[test]
fn test_basic_preset_leaves_address() {
    let policy = CategoryPolicy::from_preset(Preset::Basic);
    let spans = detect(RESUME, &KeywordSet::new(), &policy);
    assert!(spans.iter().all(|s| s.category != Category::Address));
    let masked = mask_str(RESUME, &spans, &policy);
    assert!(masked.text.contains("東京都千代田区千代田1-1"));
    assert!(!masked.text.contains("taro@example.jp"));
}

#[test]
fn test_spans_are_exact_slices() {
    let policy = CategoryPolicy::from_preset(Preset::Strict);
    let text = "Name: Taro Yamada\nhttps://example.com/taro\nAddress: 12 Baker Street, London";
    let spans = detect(text, &KeywordSet::new(), &policy);
    assert!(!spans.is_empty());
    for span in &spans {
        assert_eq!(&text[span.range()], span.matched_text);
        assert!(!span.matched_text.contains('\n'));
        assert!(span.confidence > 0.0 && span.confidence <= 1.0);
    }
    for pair in spans.windows(2) {
        assert!(pair[0].end <= pair[1].start, "overlap: {:?}", pair);
    }
}

#[test]
fn test_custom_keywords() {
    let policy = CategoryPolicy::from_preset(Preset::Basic);
    let keywords = KeywordSet::from_keywords(["Project Phoenix", "ACME"], true);
    let text = "Led project phoenix at acme for three years.";
    let spans = detect(text, &keywords, &policy);
    assert_eq!(spans.len(), 2);
    assert!(spans.iter().all(|s| s.category == Category::CustomKeyword));

    let masked = mask_str(text, &spans, &policy);
    assert_eq!(masked.text, "Led [REDACTED] at [REDACTED] for three years.");
}

#[test]
fn test_keyword_set_limit() {
    let detector = PiiDetector::new(DetectorConfig {
        max_keywords: 2,
        ..Default::default()
    });
    let keywords = KeywordSet::from_keywords(["a1", "b2", "c3"], false);
    assert!(detector
        .detect_str("a1 b2 c3", &keywords, &CategoryPolicy::default())
        .is_err());
}

#[test]
fn test_strategies() {
    let mut policy = CategoryPolicy::from_preset(Preset::Standard);
    policy.set_strategy(Category::Address, MaskStrategy::PartialReveal);
    policy.set_strategy(Category::Email, MaskStrategy::CustomLiteral("(hidden)".to_string()));
    policy.set_strategy(Category::Phone, MaskStrategy::Initialize);

    let spans = detect(RESUME, &KeywordSet::new(), &policy);
    let masked = mask_str(RESUME, &spans, &policy);
    assert!(masked.text.contains("住所：東京都[ADDRESS]"), "{}", masked.text);
    assert!(masked.text.contains("メール：(hidden)"));
    assert!(masked.text.contains(&format!("TEL 03-{}", INITIALIZE_FILL)));
}

#[test]
fn test_masked_text_hides_every_enabled_value() {
    let policy = CategoryPolicy::from_preset(Preset::Strict);
    let spans = detect(RESUME, &KeywordSet::new(), &policy);
    let masked = mask_str(RESUME, &spans, &policy);
    for r in &masked.replacements {
        assert!(!masked.text.contains(&r.span.matched_text));
        assert_eq!(&masked.text[r.masked_range.clone()], r.replacement);
        assert_eq!(masked.masked_to_raw(r.masked_range.start), r.span.start);
        assert_eq!(masked.raw_to_masked(r.span.start), r.masked_range.start);
    }
}

#[test]
fn test_summary_counts() {
    let text = "a@example.com, b@example.com\nName: Taro Yamada";
    let spans = detect(text, &KeywordSet::new(), &CategoryPolicy::from_preset(Preset::Basic));
    let summary = summarize(&spans);
    assert_eq!(summary.get(&Category::Email), Some(&2));
    assert_eq!(summary.get(&Category::Name), Some(&1));
    assert_eq!(summary.get(&Category::Address), None);
}
