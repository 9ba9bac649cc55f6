//! Error types for the masking pipeline.
//!
//! This module defines every error that can surface from decoding, detection,
//! export, and the external collaborators (fetch proxy, extraction tool, AI
//! endpoints).

use crate::format::Format;
use std::time::Duration;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A document could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A detection rule could not be built
    #[error(transparent)]
    Detection(#[from] DetectionError),

    /// An external collaborator failed
    #[error(transparent)]
    External(#[from] ExternalCallError),

    /// Export to the requested target failed
    #[error("Export error: {0}")]
    Export(String),

    /// Operation not valid in the current view state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Programmer error caught while processing a single document
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classification of a decoding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeErrorKind {
    /// Container or markup is damaged beyond recovery
    Corrupt,
    /// Recognised container, but a variant we cannot read (encrypted, binary workbook, ...)
    UnsupportedSubformat,
    /// Decoding succeeded structurally but produced no text
    EmptyContent,
    /// Input or a decompressed part exceeded the configured limits
    SizeExceeded,
}

/// Decoding failure for one document.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Failed to decode {format} document ({kind:?}): {message}")]
pub struct DecodeError {
    /// Failure class
    pub kind: DecodeErrorKind,
    /// Format the decoder was handling
    pub format: Format,
    /// Human readable detail
    pub message: String,
}

impl DecodeError {
    /// Create a new decode error.
    pub fn new(kind: DecodeErrorKind, format: Format, message: impl Into<String>) -> Self {
        Self {
            kind,
            format,
            message: message.into(),
        }
    }

    /// Shorthand for [`DecodeErrorKind::Corrupt`].
    pub fn corrupt(format: Format, message: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::Corrupt, format, message)
    }

    /// Shorthand for [`DecodeErrorKind::UnsupportedSubformat`].
    pub fn unsupported(format: Format, message: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::UnsupportedSubformat, format, message)
    }

    /// Shorthand for [`DecodeErrorKind::EmptyContent`].
    pub fn empty(format: Format) -> Self {
        Self::new(DecodeErrorKind::EmptyContent, format, "no text content found")
    }

    /// Shorthand for [`DecodeErrorKind::SizeExceeded`].
    pub fn size_exceeded(format: Format, size: usize, limit: usize) -> Self {
        Self::new(
            DecodeErrorKind::SizeExceeded,
            format,
            format!("{} bytes exceeds limit of {} bytes", size, limit),
        )
    }
}

/// Detection rule failures. Detection over valid text never fails; these are
/// raised only while building a detector.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DetectionError {
    /// A rule or keyword set failed to compile
    #[error("Failed to compile rule '{rule}': {reason}")]
    RuleCompile {
        /// Rule identifier
        rule: String,
        /// Compiler message
        reason: String,
    },
}

/// Failures reported by external collaborators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExternalCallError {
    /// The call did not finish within its time bound
    #[error("External call timed out after {0:?}")]
    Timeout(Duration),

    /// Caller exceeded its request budget
    #[error("Rate limited; retry after {retry_after:?}")]
    RateLimited {
        /// Time until the current window resets
        retry_after: Duration,
    },

    /// Target rejected by SSRF rules
    #[error("Blocked target: {reason}")]
    Blocked {
        /// Why the target was rejected
        reason: String,
    },

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {status}: {message}")]
    UpstreamStatus {
        /// HTTP status code
        status: u16,
        /// Body excerpt or reason
        message: String,
    },

    /// Extraction tool is not installed
    #[error("External tool '{program}' is not available")]
    ToolUnavailable {
        /// Program that could not be spawned
        program: String,
    },

    /// Extraction tool ran but failed on this input
    #[error("External tool failed with status {status:?}: {stderr}")]
    ToolFailed {
        /// Exit code, if the process exited normally
        status: Option<i32>,
        /// Captured stderr (truncated)
        stderr: String,
    },

    /// Response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Connection-level failure
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ExternalCallError {
    /// Shorthand for [`ExternalCallError::Blocked`].
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::Blocked {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_message() {
        let err = DecodeError::corrupt(Format::Docx, "missing end tag");
        let msg = format!("{}", err);
        assert!(msg.contains("docx"));
        assert!(msg.contains("Corrupt"));
        assert!(msg.contains("missing end tag"));
    }

    #[test]
    fn test_size_exceeded_error() {
        let err = DecodeError::size_exceeded(Format::PlainText, 300, 100);
        assert_eq!(err.kind, DecodeErrorKind::SizeExceeded);
        assert!(err.message.contains("300"));
        assert!(err.message.contains("100"));
    }

    #[test]
    fn test_decode_error_converts() {
        let err: Error = DecodeError::empty(Format::Csv).into();
        assert!(matches!(err, Error::Decode(ref e) if e.kind == DecodeErrorKind::EmptyContent));
    }

    #[test]
    fn test_rule_compile_error() {
        let err = DetectionError::RuleCompile {
            rule: "keywords".to_string(),
            reason: "too big".to_string(),
        };
        assert!(format!("{}", err).contains("keywords"));
    }

    #[test]
    fn test_external_errors_are_distinct() {
        let missing = ExternalCallError::ToolUnavailable {
            program: "pandoc".to_string(),
        };
        let failed = ExternalCallError::ToolFailed {
            status: Some(2),
            stderr: "bad input".to_string(),
        };
        assert!(format!("{}", missing).contains("not available"));
        assert!(format!("{}", failed).contains("bad input"));
    }
}
