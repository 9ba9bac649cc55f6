//! User-supplied keywords (the `custom-keyword` category).

use crate::error::DetectionError;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Literal keywords matched as an extra, lowest-priority category.
///
/// Keywords are matched longest-first, so `"Acme Labs"` wins over `"Acme"` at
/// the same position. Empty keywords and keywords containing a line break are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSet {
    keywords: Vec<String>,
    /// Match ignoring case
    #[serde(default)]
    pub case_insensitive: bool,
}

impl KeywordSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an iterator of keywords.
    pub fn from_keywords<I, S>(keywords: I, case_insensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self {
            keywords: Vec::new(),
            case_insensitive,
        };
        for keyword in keywords {
            set.add(keyword);
        }
        set
    }

    /// Add one keyword (trimmed; duplicates and unusable keywords are ignored).
    pub fn add(&mut self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        let keyword = keyword.trim();
        if keyword.is_empty() || keyword.contains('\n') || self.keywords.iter().any(|k| k == keyword) {
            return;
        }
        self.keywords.push(keyword.to_string());
    }

    /// Keywords in insertion order.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Number of keywords.
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Compile into a single alternation, longest keyword first.
    ///
    /// Returns `Ok(None)` for an empty set.
    pub fn compile(&self, max_keywords: usize) -> Result<Option<Regex>, DetectionError> {
        if self.keywords.is_empty() {
            return Ok(None);
        }
        if self.keywords.len() > max_keywords {
            return Err(DetectionError::RuleCompile {
                rule: "custom-keyword".to_string(),
                reason: format!("{} keywords exceeds limit of {}", self.keywords.len(), max_keywords),
            });
        }
        let mut sorted: Vec<&String> = self.keywords.iter().collect();
        sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
        let pattern = sorted
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        RegexBuilder::new(&pattern)
            .case_insensitive(self.case_insensitive)
            .size_limit(16 * 1024 * 1024)
            .build()
            .map(Some)
            .map_err(|e| DetectionError::RuleCompile {
                rule: "custom-keyword".to_string(),
                reason: e.to_string(),
            })
    }
}
