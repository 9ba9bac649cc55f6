//! Integration tests for synchronized views and document sessions.

use async_trait::async_trait;
use careermask::advisor::{AdvisorConfig, AdvisorContext, AdvisorRequest, ContextSource};
use careermask::detect::{Category, KeywordSet};
use careermask::diff;
use careermask::error::{Error, ExternalCallError};
use careermask::export::ExportTarget;
use careermask::external::AdvisorProvider;
use careermask::format::Format;
use careermask::pipeline::{Document, Pipeline};
use careermask::policy::{CategoryPolicy, MaskStrategy, Preset};
use careermask::session::DocumentSession;
use careermask::view::{ViewKind, ViewSynchronizer};
use std::time::Duration;

const RESUME: &str = "氏名：山田 太郎\n住所：東京都千代田区千代田1-1\nメール：taro@example.jp\n自己PR：山田 太郎として営業を担当";

fn open(preset: Preset) -> ViewSynchronizer {
    Pipeline::new()
        .open_view(
            &Document::new(RESUME).with_format(Format::PlainText),
            CategoryPolicy::from_preset(preset),
            KeywordSet::new(),
        )
        .unwrap()
}

/// Returns the system prompt so tests can inspect what left the session.
struct PromptEcho;

#[async_trait]
impl AdvisorProvider for PromptEcho {
    fn name(&self) -> &str {
        "prompt-echo"
    }

    async fn complete(&self, request: &AdvisorRequest) -> Result<String, ExternalCallError> {
        Ok(request.messages[0].content.clone())
    }
}

struct Failing;

#[async_trait]
impl AdvisorProvider for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: &AdvisorRequest) -> Result<String, ExternalCallError> {
        Err(ExternalCallError::UpstreamStatus {
            status: 503,
            message: "overloaded".to_string(),
        })
    }
}

#[test]
fn test_repeated_name_masked_everywhere() {
    let mut view = open(Preset::Standard);
    let masked = view.masked().text.clone();
    assert!(!masked.contains("山田 太郎"));
    assert_eq!(masked.matches("[NAME]").count(), 2);
}

#[test]
fn test_toggle_round_trip_restores_masked_text() {
    let mut view = open(Preset::Standard);
    let original = view.masked().clone();
    for category in Category::ALL {
        view.toggle_category(category);
        view.toggle_category(category);
    }
    assert_eq!(view.masked(), &original);
}

#[test]
fn test_diff_tracks_policy() {
    let mut view = open(Preset::Standard);
    assert_eq!(diff::replaced_count(view.diff()), view.masked().len());

    view.set_category_enabled(Category::Address, false);
    let segments = view.diff().to_vec();
    assert_eq!(diff::before_text(&segments), RESUME);
    assert!(diff::after_text(&segments).contains("東京都千代田区千代田1-1"));

    let rendered = view.view_text(ViewKind::Diff).unwrap();
    assert!(rendered.contains("[-taro@example.jp-]{+[EMAIL]+}"));
}

#[test]
fn test_strategy_change_rederives() {
    let mut view = open(Preset::Standard);
    let generation = view.generation();
    view.set_strategy(Category::Email, MaskStrategy::CustomLiteral("***".to_string()));
    assert!(view.generation() > generation);
    assert!(view.masked().text.contains("メール：***"));
}

#[test]
fn test_editable_fork_is_independent() {
    let mut view = open(Preset::Standard);
    let mut editable = view.fork_editable();
    let at = editable.text().find("[EMAIL]").unwrap();
    editable.replace_range(at..at + "[EMAIL]".len(), "(withheld)").unwrap();
    assert_eq!(editable.edit_count(), 1);

    view.set_category_enabled(Category::Email, false);
    assert!(editable.text().contains("(withheld)"));
    assert!(view.masked().text.contains("taro@example.jp"));
}

#[test]
fn test_masked_context_has_no_raw_values() {
    let mut view = open(Preset::Standard);
    let context = AdvisorContext::build(&mut view, "resume.txt", ContextSource::Masked, &AdvisorConfig::default());
    let prompt = context.to_prompt();
    assert!(prompt.contains("File: resume.txt (txt)"));
    assert!(!prompt.contains("山田 太郎"));
    assert!(!prompt.contains("taro@example.jp"));
    assert_eq!(context.enabled_count, view.masked().len());
    assert!(!context.truncated);
}

#[tokio::test]
async fn test_session_rewrite_and_ai_diff() {
    let (handle, task) = DocumentSession::spawn(open(Preset::Standard));

    let rewrite = handle
        .request_rewrite(&PromptEcho, "resume.txt", &AdvisorConfig::default(), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(!rewrite.contains("taro@example.jp"));

    handle.switch_view(ViewKind::AiDiff).await.unwrap();
    let rendered = handle.active_text().await.unwrap();
    assert!(rendered.contains("{+") || rendered.contains("[-"));

    drop(handle);
    let view = task.await.unwrap();
    assert_eq!(view.active_view(), ViewKind::AiDiff);
    assert!(view.ai_text().is_some());
}

#[tokio::test]
async fn test_session_provider_failure_keeps_state() {
    let (handle, _task) = DocumentSession::spawn(open(Preset::Standard));
    let before = handle.state().await.unwrap();
    let err = handle
        .ask(&Failing, "resume.txt", &[], "How can I improve this?", &AdvisorConfig::default(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::External(ExternalCallError::UpstreamStatus { status: 503, .. })));
    assert_eq!(handle.state().await.unwrap(), before);
}

#[tokio::test]
async fn test_session_export_follows_toggles() {
    let (handle, _task) = DocumentSession::spawn(open(Preset::Standard));
    handle.set_category_enabled(Category::Name, false).await.unwrap();
    let bytes = handle.export(ExportTarget::PlainText).await.unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("山田 太郎"));
    assert!(text.contains("[EMAIL]"));
}
