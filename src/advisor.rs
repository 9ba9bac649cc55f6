//! Context handed to the AI advisor.
//!
//! [`AdvisorContext`] summarizes one document session for an AI turn: file
//! metadata, detection counts, and the source text (raw or masked) capped at a
//! character budget. [`AdvisorRequest`] wraps it with the system prompt and the
//! most recent conversation turns.

use crate::detect::Category;
use crate::format::Format;
use crate::view::ViewSynchronizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Default system prompt for résumé review.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a career advisor reviewing a résumé. \
Personal details have been replaced with bracketed placeholders such as [NAME]; \
keep every placeholder exactly as written and never guess the hidden values.";

/// Advisor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Maximum characters of source text in the context
    pub context_char_cap: usize,
    /// Appended when the source text was cut
    pub truncation_marker: String,
    /// Conversation turns kept in a request
    pub history_turns: usize,
    /// Output token bound passed to the provider
    pub max_output_tokens: u32,
    /// System prompt
    pub system_prompt: String,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            context_char_cap: 6000,
            truncation_marker: "\n…[truncated]".to_string(),
            history_turns: 10,
            max_output_tokens: 1024,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Which text the context carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextSource {
    /// Decoded text, unmasked
    Raw,
    /// Masked text for the current policy
    #[default]
    Masked,
}

/// Snapshot of one document for an AI turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorContext {
    /// Original file name
    pub file_name: String,
    /// Decoded format
    pub format: Format,
    /// Page count reported by the container, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    /// Enabled span counts per category
    pub detection_summary: BTreeMap<Category, usize>,
    /// Spans found with every category enabled
    pub total_count: usize,
    /// Spans of enabled categories
    pub enabled_count: usize,
    /// Which text `source_text` holds
    pub source: ContextSource,
    /// Source text, capped
    pub source_text: String,
    /// Whether `source_text` was cut
    pub truncated: bool,
}

impl AdvisorContext {
    /// Build a context from the current state of a session.
    pub fn build(
        view: &mut ViewSynchronizer,
        file_name: &str,
        source: ContextSource,
        config: &AdvisorConfig,
    ) -> Self {
        let total_count = view.summary_all().values().sum();
        let detection_summary = view.summary();
        let enabled_count = detection_summary.values().sum();
        let text = match source {
            ContextSource::Raw => view.raw().to_string(),
            ContextSource::Masked => view.masked().text.clone(),
        };
        let (source_text, truncated) = truncate_chars(&text, config.context_char_cap, &config.truncation_marker);
        let normalized = view.normalized();
        Self {
            file_name: file_name.to_string(),
            format: normalized.format,
            page_count: normalized.page_count,
            detection_summary,
            total_count,
            enabled_count,
            source,
            source_text,
            truncated,
        }
    }

    /// Render as a prompt block.
    pub fn to_prompt(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "File: {} ({})", self.file_name, self.format);
        if let Some(pages) = self.page_count {
            let _ = writeln!(out, "Pages: {}", pages);
        }
        let _ = writeln!(
            out,
            "Detected personal data: {} total, {} masked",
            self.total_count, self.enabled_count
        );
        for (category, count) in &self.detection_summary {
            let _ = writeln!(out, "- {}: {}", category, count);
        }
        let _ = writeln!(
            out,
            "\n--- {} text ---",
            match self.source {
                ContextSource::Raw => "Original",
                ContextSource::Masked => "Masked",
            }
        );
        out.push_str(&self.source_text);
        out
    }
}

/// Keep the first `cap` characters of `text`, appending `marker` when cut.
pub fn truncate_chars(text: &str, cap: usize, marker: &str) -> (String, bool) {
    match text.char_indices().nth(cap) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + marker.len());
            out.push_str(&text[..cut]);
            out.push_str(marker);
            (out, true)
        }
        None => (text.to_string(), false),
    }
}

/// Chat role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions
    System,
    /// End user
    User,
    /// Model
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker
    pub role: Role,
    /// Text
    pub content: String,
}

impl ChatMessage {
    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// System message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// A complete advisor turn, ready for a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorRequest {
    /// System prompt followed by the document context
    pub messages: Vec<ChatMessage>,
    /// Output bound
    pub max_output_tokens: u32,
}

impl AdvisorRequest {
    /// Assemble a request: system prompt with the context, the last
    /// `history_turns` messages of `history`, then `question`.
    pub fn new(
        context: &AdvisorContext,
        history: &[ChatMessage],
        question: impl Into<String>,
        config: &AdvisorConfig,
    ) -> Self {
        let mut messages = Vec::with_capacity(config.history_turns + 2);
        messages.push(ChatMessage::system(format!(
            "{}\n\n{}",
            config.system_prompt,
            context.to_prompt()
        )));
        let skip = history.len().saturating_sub(config.history_turns);
        messages.extend(
            history[skip..]
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned(),
        );
        messages.push(ChatMessage::user(question));
        Self {
            messages,
            max_output_tokens: config.max_output_tokens,
        }
    }

    /// The final user message.
    pub fn question(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::{decode, DecodeLimits};
    use crate::detect::{KeywordSet, PiiDetector};
    use crate::policy::{CategoryPolicy, Preset};

    fn view(text: &str) -> ViewSynchronizer {
        let normalized = decode(text.as_bytes(), Format::PlainText, &DecodeLimits::default()).unwrap();
        ViewSynchronizer::new(
            normalized,
            &PiiDetector::default(),
            KeywordSet::new(),
            CategoryPolicy::from_preset(Preset::Standard),
        )
        .unwrap()
    }

    #[test]
    fn test_truncation() {
        let text = "あ".repeat(7000);
        let config = AdvisorConfig::default();
        let (out, cut) = truncate_chars(&text, config.context_char_cap, &config.truncation_marker);
        assert!(cut);
        assert!(out.starts_with(&"あ".repeat(6000)));
        assert!(out.ends_with(&config.truncation_marker));
        assert!(out.chars().count() < 7000);

        let (same, cut) = truncate_chars("short", 6000, "…");
        assert_eq!(same, "short");
        assert!(!cut);
    }

    #[test]
    fn test_context_counts() {
        let mut v = view("Name: Taro Yamada\nEmail: taro@example.com\nhttps://example.com/taro");
        let ctx = AdvisorContext::build(&mut v, "resume.txt", ContextSource::Masked, &AdvisorConfig::default());
        assert_eq!(ctx.enabled_count, 2);
        assert_eq!(ctx.total_count, 3);
        assert!(!ctx.detection_summary.contains_key(&Category::Url));
        assert!(!ctx.source_text.contains("Taro Yamada"));
        assert!(ctx.to_prompt().contains("resume.txt"));
    }

    #[test]
    fn test_disabled_category_leaves_context() {
        let mut v = view("Name: Taro Yamada\nEmail: taro@example.com");
        v.set_category_enabled(Category::Email, false);
        let ctx = AdvisorContext::build(&mut v, "cv.txt", ContextSource::Masked, &AdvisorConfig::default());
        assert!(!ctx.detection_summary.contains_key(&Category::Email));
        assert_eq!(ctx.enabled_count, 1);
    }

    #[test]
    fn test_history_capped() {
        let mut v = view("Name: Taro Yamada");
        let config = AdvisorConfig::default();
        let ctx = AdvisorContext::build(&mut v, "cv.txt", ContextSource::Masked, &config);
        let history: Vec<ChatMessage> = (0..15)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("q{}", i))
                } else {
                    ChatMessage::assistant(format!("a{}", i))
                }
            })
            .collect();
        let request = AdvisorRequest::new(&ctx, &history, "How can I improve it?", &config);
        assert_eq!(request.messages.len(), 1 + 10 + 1);
        assert_eq!(request.messages[1].content, "a5");
        assert_eq!(request.question(), Some("How can I improve it?"));
        assert_eq!(request.max_output_tokens, 1024);
    }
}
