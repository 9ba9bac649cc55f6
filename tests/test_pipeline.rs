//! End-to-end tests: document bytes in, masked text, diff, and exports out.

use careermask::config::PipelineConfig;
use careermask::decoders::DecodeLimits;
use careermask::detect::{Category, KeywordSet};
use careermask::diff::{after_text, before_text, replaced_count};
use careermask::error::{DecodeErrorKind, Error};
use careermask::export::ExportTarget;
use careermask::format::Format;
use careermask::pipeline::{Document, Pipeline};
use careermask::policy::{CategoryPolicy, Preset};

const RESUME: &str = "氏名：山田 太郎\n住所：東京都千代田区千代田1-1";

#[test]
fn test_japanese_resume_end_to_end() {
    let pipeline = Pipeline::new();
    let doc = Document::new(RESUME).with_file_name("resume.txt");
    let out = pipeline
        .process(&doc, &CategoryPolicy::from_preset(Preset::Standard), &KeywordSet::new())
        .unwrap();

    assert_eq!(out.spans.len(), 2);
    assert_eq!(out.spans[0].category, Category::Name);
    assert_eq!(out.spans[1].category, Category::Address);
    assert_eq!(out.masked.text, "氏名：[NAME]\n住所：[ADDRESS]");
    assert!(!out.needs_external_extraction);

    let segments = out.diff();
    assert_eq!(replaced_count(&segments), 2);
    assert_eq!(before_text(&segments), RESUME);
    assert_eq!(after_text(&segments), out.masked.text);
}

#[test]
fn test_html_document_sniffed() {
    let html = "<html><body><h1>Name: Taro Yamada</h1><p>Email: taro@example.com</p><p>Ten years of backend development in Rust and Go.</p></body></html>";
    let out = Pipeline::new()
        .process(
            &Document::new(html),
            &CategoryPolicy::from_preset(Preset::Basic),
            &KeywordSet::new(),
        )
        .unwrap();
    assert_eq!(out.normalized.format, Format::Html);
    assert_eq!(
        out.masked.text,
        "Name: [NAME]\nEmail: [EMAIL]\nTen years of backend development in Rust and Go."
    );
}

#[test]
fn test_export_of_processed_document() {
    let doc = Document::new("Name: Taro Yamada\nEmail: taro@example.com").with_format(Format::PlainText);
    let out = Pipeline::new()
        .process(&doc, &CategoryPolicy::default(), &KeywordSet::new())
        .unwrap();
    let bytes = out.export(ExportTarget::PlainText).unwrap();
    assert_eq!(bytes, b"Name: [NAME]\nEmail: [EMAIL]\n");

    let pdf = out.export(ExportTarget::Pdf).unwrap();
    assert!(pdf.starts_with(b"%PDF-"));
}

#[test]
fn test_config_limits_apply() {
    let config = PipelineConfig::default().with_limits(DecodeLimits {
        max_input_bytes: 8,
        ..Default::default()
    });
    let err = Pipeline::with_config(config)
        .process(
            &Document::new("Name: Taro Yamada").with_format(Format::PlainText),
            &CategoryPolicy::default(),
            &KeywordSet::new(),
        )
        .unwrap_err();
    match err {
        Error::Decode(e) => assert_eq!(e.kind, DecodeErrorKind::SizeExceeded),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_batch_keeps_order() {
    let docs: Vec<Document> = (0..16)
        .map(|i| Document::new(format!("Email: user{}@example.com", i)).with_format(Format::PlainText))
        .collect();
    let results = Pipeline::new().process_batch(&docs, &CategoryPolicy::default(), &KeywordSet::new());
    assert_eq!(results.len(), 16);
    for (i, result) in results.iter().enumerate() {
        let out = result.as_ref().unwrap();
        assert_eq!(out.spans.len(), 1);
        assert_eq!(out.spans[0].matched_text, format!("user{}@example.com", i));
        assert_eq!(out.masked.text, "Email: [EMAIL]");
    }
}

#[test]
fn test_batch_failure_is_isolated() {
    let docs = vec![
        Document::new("Name: Taro Yamada").with_format(Format::PlainText),
        Document::new(b"{\\rtf1 broken".to_vec()).with_format(Format::Json),
        Document::new("Email: taro@example.com").with_format(Format::PlainText),
    ];
    let results = Pipeline::new().process_batch(&docs, &CategoryPolicy::default(), &KeywordSet::new());
    assert!(results[0].is_ok());
    assert!(matches!(&results[1], Err(Error::Decode(e)) if e.kind == DecodeErrorKind::Corrupt));
    assert!(results[2].is_ok());
}

#[test]
fn test_open_view_starts_masked() {
    let mut view = Pipeline::new()
        .open_view(
            &Document::new(RESUME).with_format(Format::PlainText),
            CategoryPolicy::from_preset(Preset::Standard),
            KeywordSet::new(),
        )
        .unwrap();
    assert_eq!(view.active_text().unwrap(), "氏名：[NAME]\n住所：[ADDRESS]");
    assert_eq!(view.raw(), RESUME);
}
