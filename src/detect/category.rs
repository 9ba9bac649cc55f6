//! PII categories and their table-driven defaults.
//!
//! Every per-category behaviour (placeholder label, default strategy, merge
//! rule, preset membership) lives in [`CATEGORY_TABLE`]; detection, merging,
//! and masking only ever consult the table.

use crate::policy::{MaskStrategy, Preset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// PII category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Personal name
    Name,
    /// Postal address
    Address,
    /// Phone number
    Phone,
    /// E-mail address
    Email,
    /// Date of birth
    DateOfBirth,
    /// Government or employer ID number
    IdNumber,
    /// Postal / ZIP code
    PostalCode,
    /// Personal URL (portfolio, profile)
    Url,
    /// Employer, school, or other organization
    Organization,
    /// User-supplied literal keyword
    CustomKeyword,
}

/// Static description of one category.
#[derive(Debug)]
pub struct CategoryInfo {
    /// Category described by this row
    pub category: Category,
    /// Stable identifier
    pub id: &'static str,
    /// Placeholder used by full-replace masking
    pub label: &'static str,
    /// Strategy applied when the policy has no override
    pub default_strategy: MaskStrategy,
    /// Merge same-category spans separated only by horizontal whitespace
    pub merge_adjacent: bool,
    /// Characters kept by the initialize strategy
    pub initial_chars: usize,
    /// Smallest preset that enables the category
    pub min_preset: Preset,
}

/// One row per category, in default priority order.
pub static CATEGORY_TABLE: [CategoryInfo; 10] = [
    CategoryInfo {
        category: Category::Name,
        id: "name",
        label: "[NAME]",
        default_strategy: MaskStrategy::FullReplace,
        merge_adjacent: true,
        initial_chars: 1,
        min_preset: Preset::Basic,
    },
    CategoryInfo {
        category: Category::Address,
        id: "address",
        label: "[ADDRESS]",
        default_strategy: MaskStrategy::FullReplace,
        merge_adjacent: true,
        initial_chars: 3,
        min_preset: Preset::Standard,
    },
    CategoryInfo {
        category: Category::Email,
        id: "email",
        label: "[EMAIL]",
        default_strategy: MaskStrategy::FullReplace,
        merge_adjacent: false,
        initial_chars: 1,
        min_preset: Preset::Basic,
    },
    CategoryInfo {
        category: Category::Phone,
        id: "phone",
        label: "[PHONE]",
        default_strategy: MaskStrategy::FullReplace,
        merge_adjacent: false,
        initial_chars: 3,
        min_preset: Preset::Basic,
    },
    CategoryInfo {
        category: Category::DateOfBirth,
        id: "date-of-birth",
        label: "[DOB]",
        default_strategy: MaskStrategy::FullReplace,
        merge_adjacent: false,
        initial_chars: 4,
        min_preset: Preset::Standard,
    },
    CategoryInfo {
        category: Category::IdNumber,
        id: "id-number",
        label: "[ID]",
        default_strategy: MaskStrategy::FullReplace,
        merge_adjacent: false,
        initial_chars: 2,
        min_preset: Preset::Strict,
    },
    CategoryInfo {
        category: Category::PostalCode,
        id: "postal-code",
        label: "[POSTAL]",
        default_strategy: MaskStrategy::FullReplace,
        merge_adjacent: false,
        initial_chars: 2,
        min_preset: Preset::Strict,
    },
    CategoryInfo {
        category: Category::Url,
        id: "url",
        label: "[URL]",
        default_strategy: MaskStrategy::FullReplace,
        merge_adjacent: false,
        initial_chars: 8,
        min_preset: Preset::Strict,
    },
    CategoryInfo {
        category: Category::Organization,
        id: "organization",
        label: "[ORG]",
        default_strategy: MaskStrategy::FullReplace,
        merge_adjacent: false,
        initial_chars: 1,
        min_preset: Preset::Strict,
    },
    CategoryInfo {
        category: Category::CustomKeyword,
        id: "custom-keyword",
        label: "[REDACTED]",
        default_strategy: MaskStrategy::FullReplace,
        merge_adjacent: false,
        initial_chars: 1,
        min_preset: Preset::Basic,
    },
];

impl Category {
    /// Every category, in default priority order.
    pub const ALL: [Category; 10] = [
        Category::Name,
        Category::Address,
        Category::Email,
        Category::Phone,
        Category::DateOfBirth,
        Category::IdNumber,
        Category::PostalCode,
        Category::Url,
        Category::Organization,
        Category::CustomKeyword,
    ];

    /// Table row for this category.
    pub fn info(&self) -> &'static CategoryInfo {
        let index = match self {
            Category::Name => 0,
            Category::Address => 1,
            Category::Email => 2,
            Category::Phone => 3,
            Category::DateOfBirth => 4,
            Category::IdNumber => 5,
            Category::PostalCode => 6,
            Category::Url => 7,
            Category::Organization => 8,
            Category::CustomKeyword => 9,
        };
        &CATEGORY_TABLE[index]
    }

    /// Stable identifier (`"date-of-birth"`, ...).
    pub fn id(&self) -> &'static str {
        self.info().id
    }

    /// Full-replace placeholder (`"[NAME]"`, ...).
    pub fn label(&self) -> &'static str {
        self.info().label
    }

    /// Parse an identifier.
    pub fn from_id(id: &str) -> Option<Category> {
        let id = id.trim().to_ascii_lowercase().replace('_', "-");
        CATEGORY_TABLE.iter().find(|info| info.id == id).map(|info| info.category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
