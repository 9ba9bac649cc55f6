//! Synchronized raw / masked / diff / AI views of one document.
//!
//! The synchronizer scans the document once and keeps the [`CandidateSet`].
//! Policy changes drop the derived state (spans, masked text, diffs), which is
//! rebuilt on the next read by re-resolving the cached candidates. Raw text and
//! the AI rewrite are never invalidated by a policy change.

use crate::detect::{self, Category, CandidateSet, DetectionSpan, DetectorConfig, KeywordSet, PiiDetector};
use crate::diff::{self, DiffSegment};
use crate::error::{Error, Result};
use crate::mask::{self, EditableText, MaskedText};
use crate::offset::NormalizedText;
use crate::policy::{CategoryPolicy, MaskStrategy, Preset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which view is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewKind {
    /// Decoded text
    Raw,
    /// Masked text
    #[default]
    Masked,
    /// Raw vs masked, span-anchored
    Diff,
    /// AI rewrite
    Ai,
    /// Masked vs AI rewrite
    AiDiff,
}

impl ViewKind {
    /// Every view.
    pub const ALL: [ViewKind; 5] = [
        ViewKind::Raw,
        ViewKind::Masked,
        ViewKind::Diff,
        ViewKind::Ai,
        ViewKind::AiDiff,
    ];

    /// Stable identifier.
    pub fn id(&self) -> &'static str {
        match self {
            ViewKind::Raw => "raw",
            ViewKind::Masked => "masked",
            ViewKind::Diff => "diff",
            ViewKind::Ai => "ai",
            ViewKind::AiDiff => "ai-diff",
        }
    }

    /// Parse an identifier.
    pub fn from_id(id: &str) -> Option<ViewKind> {
        ViewKind::ALL
            .into_iter()
            .find(|v| v.id().eq_ignore_ascii_case(id.trim()))
    }

    /// Whether the view needs AI text.
    pub fn needs_ai(&self) -> bool {
        matches!(self, ViewKind::Ai | ViewKind::AiDiff)
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Serializable snapshot of the user-facing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Active view
    pub active_view: ViewKind,
    /// Current policy
    pub policy: CategoryPolicy,
    /// AI rewrite, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_text: Option<String>,
}

/// State derived from the policy.
#[derive(Debug, Clone)]
struct Derived {
    spans: Vec<DetectionSpan>,
    masked: MaskedText,
    diff: Vec<DiffSegment>,
}

impl Derived {
    fn compute(candidates: &CandidateSet, policy: &CategoryPolicy, config: &DetectorConfig) -> Self {
        let spans = detect::resolve(candidates, policy, config);
        let masked = mask::mask_str(candidates.text(), &spans, policy);
        let diff = diff::diff(candidates.text(), &masked);
        Self { spans, masked, diff }
    }
}

/// Owner of all views of one document.
#[derive(Debug, Clone)]
pub struct ViewSynchronizer {
    normalized: NormalizedText,
    config: DetectorConfig,
    keywords: KeywordSet,
    candidates: CandidateSet,
    policy: CategoryPolicy,
    active: ViewKind,
    ai_text: Option<String>,
    derived: Option<Derived>,
    ai_diff: Option<Vec<DiffSegment>>,
    generation: u64,
}

impl ViewSynchronizer {
    /// Scan `normalized` and start in the masked view.
    pub fn new(
        normalized: NormalizedText,
        detector: &PiiDetector,
        keywords: KeywordSet,
        policy: CategoryPolicy,
    ) -> Result<Self> {
        let candidates = detector.scan(&normalized.text, &keywords)?;
        Ok(Self {
            normalized,
            config: detector.config().clone(),
            keywords,
            candidates,
            policy,
            active: ViewKind::default(),
            ai_text: None,
            derived: None,
            ai_diff: None,
            generation: 0,
        })
    }

    /// Decoded document.
    pub fn normalized(&self) -> &NormalizedText {
        &self.normalized
    }

    /// Raw text.
    pub fn raw(&self) -> &str {
        &self.normalized.text
    }

    /// Current policy.
    pub fn policy(&self) -> &CategoryPolicy {
        &self.policy
    }

    /// Current keyword set.
    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    /// Active view.
    pub fn active_view(&self) -> ViewKind {
        self.active
    }

    /// AI rewrite, if one was supplied.
    pub fn ai_text(&self) -> Option<&str> {
        self.ai_text.as_deref()
    }

    /// Bumped every time derived state is invalidated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether masked/diff views are currently cached.
    pub fn is_derived_cached(&self) -> bool {
        self.derived.is_some()
    }

    /// Snapshot for persistence.
    pub fn state(&self) -> ViewState {
        ViewState {
            active_view: self.active,
            policy: self.policy.clone(),
            ai_text: self.ai_text.clone(),
        }
    }

    /// Restore a snapshot taken from a session over the same document.
    pub fn restore(&mut self, state: ViewState) -> Result<()> {
        if state.active_view.needs_ai() && state.ai_text.is_none() {
            return Err(Error::InvalidState(format!(
                "view '{}' requires AI text",
                state.active_view
            )));
        }
        self.policy = state.policy;
        self.ai_text = state.ai_text;
        self.active = state.active_view;
        self.invalidate();
        Ok(())
    }

    fn derived(&mut self) -> &Derived {
        let candidates = &self.candidates;
        let policy = &self.policy;
        let config = &self.config;
        self.derived
            .get_or_insert_with(|| Derived::compute(candidates, policy, config))
    }

    fn invalidate(&mut self) {
        self.derived = None;
        self.ai_diff = None;
        self.generation += 1;
    }

    /// Resolved spans for the current policy.
    pub fn spans(&mut self) -> &[DetectionSpan] {
        &self.derived().spans
    }

    /// Masked text for the current policy.
    pub fn masked(&mut self) -> &MaskedText {
        &self.derived().masked
    }

    /// Span-anchored raw vs masked diff.
    pub fn diff(&mut self) -> &[DiffSegment] {
        &self.derived().diff
    }

    /// Masked vs AI diff. Fails when no AI text is present.
    pub fn ai_diff(&mut self) -> Result<&[DiffSegment]> {
        let ai = self
            .ai_text
            .as_deref()
            .ok_or_else(|| Error::InvalidState("no AI text to compare against".to_string()))?;
        let candidates = &self.candidates;
        let policy = &self.policy;
        let config = &self.config;
        let derived = self
            .derived
            .get_or_insert_with(|| Derived::compute(candidates, policy, config));
        let segments = self
            .ai_diff
            .get_or_insert_with(|| diff::text_diff(&derived.masked.text, ai));
        Ok(segments.as_slice())
    }

    /// Per-category counts of the current spans.
    pub fn summary(&mut self) -> BTreeMap<Category, usize> {
        detect::summarize(self.spans())
    }

    /// Per-category counts with every category enabled.
    pub fn summary_all(&self) -> BTreeMap<Category, usize> {
        let everything = CategoryPolicy::from_preset(Preset::Strict);
        detect::summarize(&detect::resolve(&self.candidates, &everything, &self.config))
    }

    /// Enable or disable a category. Returns whether anything changed.
    pub fn set_category_enabled(&mut self, category: Category, enabled: bool) -> bool {
        let changed = self.policy.set_enabled(category, enabled);
        if changed {
            log::debug!("category {} {}", category, if enabled { "enabled" } else { "disabled" });
            self.invalidate();
        }
        changed
    }

    /// Flip a category. Returns the new state.
    pub fn toggle_category(&mut self, category: Category) -> bool {
        let enabled = !self.policy.is_enabled(category);
        self.set_category_enabled(category, enabled);
        enabled
    }

    /// Change the masking strategy of a category.
    pub fn set_strategy(&mut self, category: Category, strategy: MaskStrategy) {
        if self.policy.strategy(category) != &strategy {
            self.policy.set_strategy(category, strategy);
            self.invalidate();
        }
    }

    /// Switch preset, keeping overrides.
    pub fn set_preset(&mut self, preset: Preset) {
        if self.policy.preset != preset {
            self.policy.set_preset(preset);
            self.invalidate();
        }
    }

    /// Replace the whole policy.
    pub fn set_policy(&mut self, policy: CategoryPolicy) {
        if self.policy != policy {
            self.policy = policy;
            self.invalidate();
        }
    }

    /// Replace the keyword set. This re-scans the document.
    pub fn set_keywords(&mut self, keywords: KeywordSet, detector: &PiiDetector) -> Result<()> {
        if keywords == self.keywords {
            return Ok(());
        }
        self.candidates = detector.scan(&self.normalized.text, &keywords)?;
        self.config = detector.config().clone();
        self.keywords = keywords;
        self.invalidate();
        Ok(())
    }

    /// Store an AI rewrite of the masked text.
    pub fn set_ai_text(&mut self, text: impl Into<String>) {
        self.ai_text = Some(text.into());
        self.ai_diff = None;
    }

    /// Drop the AI rewrite. Leaves an AI view for the masked view.
    pub fn clear_ai_text(&mut self) {
        self.ai_text = None;
        self.ai_diff = None;
        if self.active.needs_ai() {
            self.active = ViewKind::Masked;
        }
    }

    /// Make `view` active.
    pub fn switch_view(&mut self, view: ViewKind) -> Result<()> {
        if view.needs_ai() && self.ai_text.is_none() {
            return Err(Error::InvalidState(format!("view '{}' requires AI text", view)));
        }
        self.active = view;
        Ok(())
    }

    /// Text of `view`. Diff views are rendered inline.
    pub fn view_text(&mut self, view: ViewKind) -> Result<String> {
        match view {
            ViewKind::Raw => Ok(self.raw().to_string()),
            ViewKind::Masked => Ok(self.masked().text.clone()),
            ViewKind::Diff => Ok(diff::render_inline(self.diff())),
            ViewKind::Ai => self
                .ai_text
                .clone()
                .ok_or_else(|| Error::InvalidState("no AI text available".to_string())),
            ViewKind::AiDiff => Ok(diff::render_inline(self.ai_diff()?)),
        }
    }

    /// Text of the active view.
    pub fn active_text(&mut self) -> Result<String> {
        self.view_text(self.active)
    }

    /// Fork the masked text for free editing.
    pub fn fork_editable(&mut self) -> EditableText {
        self.masked().to_editable()
    }
}
