// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::match_like_matches_macro)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # careermask
//!
//! Decode career documents, find the personal information in them, and mask
//! it per category while keeping several views of the document in sync.
//!
//! ## Core Features
//!
//! - **Ten input formats**: plain text, Markdown, HTML, RTF, CSV, JSON,
//!   spreadsheets (XLSX/XLS/ODS), DOCX, legacy DOC, and ODT, each normalized
//!   to one UTF-8 text with an offset map back to its source structure
//! - **PII detection**: labelled and free-standing names, addresses, phone
//!   numbers, e-mail addresses, birth dates, ID numbers, postal codes, URLs,
//!   organizations, and custom keywords, resolved to sorted non-overlapping
//!   spans
//! - **Masking policies**: per-category enablement and strategy (label,
//!   partial reveal, initials, custom literal) grouped into presets
//! - **Synchronized views**: raw, masked, span-anchored diff, AI rewrite and
//!   AI diff, re-derived on every toggle without re-running detection
//! - **Export**: plain text, Markdown, CSV, XLSX, DOCX, and PDF
//!
//! ## Architecture
//!
//! ```text
//! bytes ─[decoders]→ NormalizedText ─[detect]→ spans ─[mask]→ MaskedText
//!                                                       ↓
//!                               ViewSynchronizer (raw/masked/diff/ai/ai-diff)
//!                                                       ↓
//!                                                  [export] → bytes
//! ```
//!
//! The core stages do no I/O. Network and process calls (remote fetch, the
//! external extraction tool, AI providers) live in [`external`] and are
//! always bounded by timeouts.
//!
//! ## Quick Start
//!
//! ```
//! use careermask::detect::KeywordSet;
//! use careermask::format::Format;
//! use careermask::pipeline::{Document, Pipeline};
//! use careermask::policy::{CategoryPolicy, Preset};
//!
//! # fn main() -> careermask::Result<()> {
//! let doc = Document::new("氏名：山田 太郎\nEmail: taro@example.com").with_format(Format::PlainText);
//! let out = Pipeline::new().process(&doc, &CategoryPolicy::from_preset(Preset::Standard), &KeywordSet::new())?;
//! assert_eq!(out.masked.text, "氏名：[NAME]\nEmail: [EMAIL]");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Document model
pub mod format;
pub mod offset;

// Format decoders
pub mod decoders;

// Detection and masking
pub mod detect;
pub mod mask;
pub mod policy;

// Views
pub mod diff;
pub mod session;
pub mod view;

// Export
pub mod export;

// AI context and out-of-core collaborators
pub mod advisor;
pub mod external;

// Orchestration
pub mod pipeline;

// Configuration
pub mod config;

// Re-exports
pub use config::{ExternalConfig, PipelineConfig};
pub use detect::{Category, DetectionSpan, KeywordSet, PiiDetector};
pub use error::{Error, Result};
pub use format::Format;
pub use mask::MaskedText;
pub use offset::NormalizedText;
pub use pipeline::{Document, Pipeline, ProcessedDocument};
pub use policy::{CategoryPolicy, MaskStrategy, Preset};
pub use view::{ViewKind, ViewSynchronizer};
