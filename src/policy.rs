//! Category enablement and masking strategy policy.
//!
//! A [`CategoryPolicy`] starts from a [`Preset`] and layers per-category user
//! overrides on top. Policies serialize to JSON so a session can persist its
//! overrides.

use crate::detect::Category;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How an enabled span is rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum MaskStrategy {
    /// Replace with the category placeholder (`[NAME]`)
    FullReplace,
    /// Keep the tagged region (e.g. prefecture), replace the rest
    PartialReveal,
    /// Keep a short prefix, replace the rest with an ellipsis
    Initialize,
    /// Replace with a configured literal
    CustomLiteral(String),
}

/// Named default enablement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Name, email, phone
    Basic,
    /// Basic plus address and date of birth
    #[default]
    Standard,
    /// Every category
    Strict,
}

impl Preset {
    /// All presets, loosest first.
    pub const ALL: [Preset; 3] = [Preset::Basic, Preset::Standard, Preset::Strict];

    /// Stable identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Preset::Basic => "basic",
            Preset::Standard => "standard",
            Preset::Strict => "strict",
        }
    }

    /// Parse an identifier.
    pub fn from_id(id: &str) -> Option<Preset> {
        Preset::ALL
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(id.trim()))
    }

    /// Whether this preset enables `category` by default.
    pub fn enables(&self, category: Category) -> bool {
        *self >= category.info().min_preset
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// User override for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOverride {
    /// Enablement override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Strategy override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MaskStrategy>,
}

/// Per-category enablement and strategy: a preset plus user overrides.
///
/// # Examples
///
/// ```
/// use careermask::detect::Category;
/// use careermask::policy::{CategoryPolicy, Preset};
///
/// let mut policy = CategoryPolicy::from_preset(Preset::Basic);
/// assert!(!policy.is_enabled(Category::Address));
/// policy.set_enabled(Category::Address, true);
/// assert!(policy.is_enabled(Category::Address));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPolicy {
    /// Base preset
    pub preset: Preset,
    /// Overrides keyed by category
    #[serde(default)]
    pub overrides: BTreeMap<Category, CategoryOverride>,
}

impl CategoryPolicy {
    /// Policy with no overrides.
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            preset,
            overrides: BTreeMap::new(),
        }
    }

    /// Whether spans of `category` are reported and masked.
    pub fn is_enabled(&self, category: Category) -> bool {
        self.overrides
            .get(&category)
            .and_then(|o| o.enabled)
            .unwrap_or_else(|| self.preset.enables(category))
    }

    /// Effective strategy for `category`.
    pub fn strategy(&self, category: Category) -> &MaskStrategy {
        self.overrides
            .get(&category)
            .and_then(|o| o.strategy.as_ref())
            .unwrap_or(&category.info().default_strategy)
    }

    /// Enable or disable a category. Returns whether the effective state changed.
    pub fn set_enabled(&mut self, category: Category, enabled: bool) -> bool {
        let before = self.is_enabled(category);
        self.overrides.entry(category).or_default().enabled = Some(enabled);
        self.prune(category);
        before != enabled
    }

    /// Override the strategy of a category.
    pub fn set_strategy(&mut self, category: Category, strategy: MaskStrategy) {
        self.overrides.entry(category).or_default().strategy = Some(strategy);
        self.prune(category);
    }

    /// Switch preset, keeping user overrides.
    pub fn set_preset(&mut self, preset: Preset) {
        self.preset = preset;
    }

    /// Drop every override.
    pub fn reset(&mut self) {
        self.overrides.clear();
    }

    /// Enabled categories in default priority order.
    pub fn enabled_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.is_enabled(*c))
            .collect()
    }

    /// Serialize for session persistence.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load a persisted policy.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::from)
    }

    // Overrides equal to the defaults are not worth persisting
    fn prune(&mut self, category: Category) {
        let preset_enabled = self.preset.enables(category);
        if let Some(entry) = self.overrides.get_mut(&category) {
            if entry.enabled == Some(preset_enabled) {
                entry.enabled = None;
            }
            if entry.strategy.as_ref() == Some(&category.info().default_strategy) {
                entry.strategy = None;
            }
            if entry.enabled.is_none() && entry.strategy.is_none() {
                self.overrides.remove(&category);
            }
        }
    }
}
