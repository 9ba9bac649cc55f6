//! Fallback text extraction through an external program.
//!
//! Used when a decoder yields too little text (scanned layouts, exotic
//! containers). The document bytes are piped to the program's stdin and its
//! stdout is taken as UTF-8 text.

use crate::config::ExternalConfig;
use crate::decoders::encoding::decode_text;
use crate::error::ExternalCallError;
use base64::Engine as _;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Stderr kept for error reports.
const STDERR_CAP: usize = 16 * 1024;

/// Text produced by the external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// Extracted text (LF line endings)
    pub text: String,
    /// Whether stdout hit the output cap
    pub truncated: bool,
}

/// Runs an extraction program with a timeout and an output cap.
#[derive(Debug, Clone)]
pub struct ExternalExtractor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ExternalExtractor {
    /// Extractor running `program` with default bounds.
    pub fn new(program: impl Into<String>) -> Self {
        Self::from_config(program, &ExternalConfig::default())
    }

    /// Extractor running `program` with configured bounds.
    pub fn from_config(program: impl Into<String>, config: &ExternalConfig) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: config.tool_timeout(),
            max_output_bytes: config.tool_max_output_bytes,
        }
    }

    /// Arguments passed to the program.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the stdout cap.
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Extract from base-64 encoded document bytes.
    pub async fn extract_base64(&self, payload: &str) -> Result<ExtractedText, ExternalCallError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ExternalCallError::InvalidResponse(format!("payload is not valid base64: {}", e)))?;
        self.extract(&bytes).await
    }

    /// Extract from raw document bytes.
    ///
    /// A program that cannot be spawned because it is missing reports
    /// [`ExternalCallError::ToolUnavailable`]; one that runs and exits
    /// non-zero reports [`ExternalCallError::ToolFailed`].
    pub async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExternalCallError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    log::warn!("extraction tool {} is not installed", self.program);
                    ExternalCallError::ToolUnavailable {
                        program: self.program.clone(),
                    }
                } else {
                    ExternalCallError::ToolFailed {
                        status: None,
                        stderr: format!("failed to start {}: {}", self.program, e),
                    }
                }
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let cap = self.max_output_bytes;

        let run = async {
            let write = async {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(bytes).await?;
                    stdin.shutdown().await?;
                }
                Ok::<_, std::io::Error>(())
            };
            let (written, out, err) = tokio::join!(write, read_capped(stdout, cap), read_capped(stderr, STDERR_CAP));
            if let Err(e) = written {
                // Tools may exit before reading all input
                log::debug!("writing to {} failed: {}", self.program, e);
            }
            let (out, truncated) = out?;
            let (err, _) = err?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, truncated, err))
        };

        let outcome = tokio::time::timeout(self.timeout, run).await;
        let (status, out, truncated, err) = match outcome {
            Ok(result) => result.map_err(|e| ExternalCallError::ToolFailed {
                status: None,
                stderr: e.to_string(),
            })?,
            Err(_) => {
                let _ = child.start_kill();
                log::warn!("extraction tool {} timed out after {:?}", self.program, self.timeout);
                return Err(ExternalCallError::Timeout(self.timeout));
            },
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&err).trim().to_string();
            log::warn!("extraction tool {} exited with {:?}", self.program, status.code());
            return Err(ExternalCallError::ToolFailed {
                status: status.code(),
                stderr,
            });
        }

        let (text, _) = decode_text(&out);
        Ok(ExtractedText { text, truncated })
    }
}

/// Read at most `cap` bytes, then drain the rest so the child never blocks on
/// a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, cap: usize) -> std::io::Result<(Vec<u8>, bool)> {
    let mut reader = match reader {
        Some(reader) => reader,
        None => return Ok((Vec::new(), false)),
    };
    let mut buf = Vec::new();
    (&mut reader).take(cap as u64 + 1).read_to_end(&mut buf).await?;
    let truncated = buf.len() > cap;
    if truncated {
        buf.truncate(cap);
        tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    }
    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_tool_is_unavailable() {
        let extractor = ExternalExtractor::new("careermask-no-such-extractor");
        match extractor.extract(b"x").await {
            Err(ExternalCallError::ToolUnavailable { program }) => {
                assert_eq!(program, "careermask-no-such-extractor")
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_base64() {
        let extractor = ExternalExtractor::new("cat");
        assert!(matches!(
            extractor.extract_base64("***").await,
            Err(ExternalCallError::InvalidResponse(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_round_trip_through_cat() {
        let extractor = ExternalExtractor::new("cat");
        let payload = base64::engine::general_purpose::STANDARD.encode("氏名：山田 太郎\r\n");
        let out = extractor.extract_base64(&payload).await.unwrap();
        assert_eq!(out.text, "氏名：山田 太郎\n");
        assert!(!out.truncated);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_tool_failure() {
        let extractor = ExternalExtractor::new("sh").with_args(["-c", "echo broken >&2; exit 3"]);
        match extractor.extract(b"").await {
            Err(ExternalCallError::ToolFailed { status, stderr }) => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "broken");
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let extractor = ExternalExtractor::new("sleep")
            .with_args(["5"])
            .with_timeout(Duration::from_millis(100));
        assert!(matches!(extractor.extract(b"").await, Err(ExternalCallError::Timeout(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_cap() {
        let extractor = ExternalExtractor::new("sh")
            .with_args(["-c", "i=0; while [ $i -lt 2000 ]; do echo line; i=$((i+1)); done"])
            .with_max_output_bytes(100);
        let out = extractor.extract(b"").await.unwrap();
        assert!(out.truncated);
        assert_eq!(out.text.len(), 100);
    }
}
