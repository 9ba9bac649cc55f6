//! Document pipeline: decode → detect → mask.
//!
//! ```text
//! Document (bytes, declared format, file name)
//!     ↓
//! [decode]   NormalizedText + OffsetMap
//!     ↓
//! [detect]   DetectionSpan[] (sorted, non-overlapping)
//!     ↓
//! [mask]     MaskedText
//! ```
//!
//! Every stage is a pure function of its inputs, so batches run one document
//! per rayon worker with no shared mutable state. A panic inside one document
//! is caught and reported as [`Error::Internal`] for that document only.

use crate::config::PipelineConfig;
use crate::decoders;
use crate::detect::{summarize, Category, DetectionSpan, KeywordSet, PiiDetector};
use crate::diff::{self, DiffSegment};
use crate::error::{DecodeError, DecodeErrorKind, Error, Result};
use crate::export::{self, ExportTarget};
use crate::external::ExternalExtractor;
use crate::format::Format;
use crate::mask::{self, MaskedText};
use crate::offset::{NormalizedText, Origin, TextBuilder};
use crate::policy::CategoryPolicy;
use crate::view::ViewSynchronizer;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Immutable input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Raw bytes
    pub bytes: Vec<u8>,
    /// Format declared by the caller; `None` means sniff
    pub declared_format: Option<Format>,
    /// Original file name, if known
    pub file_name: Option<String>,
}

impl Document {
    /// Document with an unknown format.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_format: None,
            file_name: None,
        }
    }

    /// Set the declared format.
    pub fn with_format(mut self, format: Format) -> Self {
        self.declared_format = Some(format);
        self
    }

    /// Set the file name (also used as a sniffing hint).
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Declared format, or the sniffed one.
    pub fn resolved_format(&self) -> Format {
        self.declared_format
            .unwrap_or_else(|| Format::sniff(&self.bytes, self.file_name.as_deref()))
    }

    /// File name for display, falling back to a generic one.
    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("document")
    }
}

/// Result of running one document through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDocument {
    /// File name of the input, if known
    pub file_name: Option<String>,
    /// Decoded text
    pub normalized: NormalizedText,
    /// Enabled spans, sorted and non-overlapping
    pub spans: Vec<DetectionSpan>,
    /// Masked text
    pub masked: MaskedText,
    /// Span count per category
    pub summary: BTreeMap<Category, usize>,
    /// Decoding yielded too little text; try the external extraction tool
    pub needs_external_extraction: bool,
}

impl ProcessedDocument {
    /// Span-anchored diff between raw and masked text.
    pub fn diff(&self) -> Vec<DiffSegment> {
        diff::diff(&self.normalized.text, &self.masked)
    }

    /// Export the masked text.
    pub fn export(&self, target: ExportTarget) -> Result<Vec<u8>> {
        export::export(&self.masked.text, &self.normalized.offset_map, target)
    }
}

/// Runs documents through decode, detect, and mask.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    detector: PiiDetector,
}

impl Pipeline {
    /// Create a new pipeline with default configuration.
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Create a pipeline with custom configuration.
    pub fn with_config(config: PipelineConfig) -> Self {
        let detector = PiiDetector::new(config.detector.clone());
        Self { config, detector }
    }

    /// Configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Detector in use.
    pub fn detector(&self) -> &PiiDetector {
        &self.detector
    }

    /// Decode a document with the configured limits.
    pub fn decode(&self, document: &Document) -> Result<NormalizedText> {
        let format = document.resolved_format();
        Ok(decoders::decode(&document.bytes, format, &self.config.limits)?)
    }

    /// Decode, detect, and mask one document.
    pub fn process(
        &self,
        document: &Document,
        policy: &CategoryPolicy,
        keywords: &KeywordSet,
    ) -> Result<ProcessedDocument> {
        let normalized = self.decode(document)?;
        self.process_normalized(document, normalized, policy, keywords)
    }

    /// Like [`Pipeline::process`], but hands the document to `extractor` when
    /// decoding finds no text or too little of it. The extractor's output
    /// replaces the decoded text only when it has more content.
    pub async fn process_with_fallback(
        &self,
        document: &Document,
        policy: &CategoryPolicy,
        keywords: &KeywordSet,
        extractor: &ExternalExtractor,
    ) -> Result<ProcessedDocument> {
        let primary = match self.decode(document) {
            Ok(normalized) if content_chars(&normalized.text) >= self.config.min_extracted_chars => {
                return self.process_normalized(document, normalized, policy, keywords);
            },
            Ok(normalized) => Some(normalized),
            Err(Error::Decode(e)) if e.kind == DecodeErrorKind::EmptyContent => None,
            Err(e) => return Err(e),
        };

        log::info!(
            "{}: running external extraction with {}",
            document.display_name(),
            extractor.program()
        );
        let extracted = extractor.extract(&document.bytes).await?;
        let replaces = primary
            .as_ref()
            .map_or(true, |p| content_chars(&extracted.text) > content_chars(&p.text));
        let normalized = match primary {
            Some(primary) if !replaces => primary,
            _ => {
                let mut builder = TextBuilder::new(document.resolved_format());
                for (line, content) in extracted.text.split('\n').enumerate() {
                    builder.push_line(content, Origin::Line { line });
                }
                builder.trim_trailing_blank_lines();
                builder.warn(format!("text recovered by external tool {}", extractor.program()));
                if extracted.truncated {
                    builder.warn("external tool output was truncated");
                }
                let normalized = builder.finish();
                if !normalized.has_content() {
                    return Err(DecodeError::empty(document.resolved_format()).into());
                }
                normalized
            },
        };
        self.process_normalized(document, normalized, policy, keywords)
    }

    fn process_normalized(
        &self,
        document: &Document,
        normalized: NormalizedText,
        policy: &CategoryPolicy,
        keywords: &KeywordSet,
    ) -> Result<ProcessedDocument> {
        let spans = self.detector.detect(&normalized, keywords, policy)?;
        let masked = mask::mask(&normalized, &spans, policy);
        let summary = summarize(&spans);

        let extracted = content_chars(&normalized.text);
        let needs_external_extraction = extracted < self.config.min_extracted_chars;
        if needs_external_extraction {
            log::info!(
                "{}: only {} characters extracted, external extraction advised",
                document.display_name(),
                extracted
            );
        }
        log::debug!(
            "{}: {} spans, {} replacements",
            document.display_name(),
            spans.len(),
            masked.len()
        );

        Ok(ProcessedDocument {
            file_name: document.file_name.clone(),
            normalized,
            spans,
            masked,
            summary,
            needs_external_extraction,
        })
    }

    /// Process documents in parallel. Results keep input order; a failure
    /// (including a panic) affects only its own document.
    pub fn process_batch(
        &self,
        documents: &[Document],
        policy: &CategoryPolicy,
        keywords: &KeywordSet,
    ) -> Vec<Result<ProcessedDocument>> {
        documents
            .par_iter()
            .map(|document| {
                catch_unwind(AssertUnwindSafe(|| self.process(document, policy, keywords))).unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    log::warn!("{}: processing panicked: {}", document.display_name(), message);
                    Err(Error::Internal(format!("{}: {}", document.display_name(), message)))
                })
            })
            .collect()
    }

    /// Decode a document and open a view synchronizer on it.
    pub fn open_view(
        &self,
        document: &Document,
        policy: CategoryPolicy,
        keywords: KeywordSet,
    ) -> Result<ViewSynchronizer> {
        let normalized = self.decode(document)?;
        ViewSynchronizer::new(normalized, &self.detector, keywords, policy)
    }
}

fn content_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
