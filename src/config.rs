//! Configuration for document processing and external collaborators.
//!
//! Both structs load from JSON (missing fields take their defaults) and have
//! `with_*` builders for programmatic use.

use crate::advisor::AdvisorConfig;
use crate::decoders::DecodeLimits;
use crate::detect::DetectorConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Document processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Size and decompression limits for decoders.
    pub limits: DecodeLimits,

    /// Detector settings.
    pub detector: DetectorConfig,

    /// Advisor context and request settings.
    pub advisor: AdvisorConfig,

    /// Below this many non-whitespace characters the document is flagged for
    /// external extraction.
    pub min_extracted_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            limits: DecodeLimits::default(),
            detector: DetectorConfig::default(),
            advisor: AdvisorConfig::default(),
            min_extracted_chars: 20,
        }
    }

    /// Parse a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set decode limits.
    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set detector settings.
    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// Set advisor settings.
    pub fn with_advisor(mut self, advisor: AdvisorConfig) -> Self {
        self.advisor = advisor;
        self
    }

    /// Set the external extraction threshold.
    pub fn with_min_extracted_chars(mut self, chars: usize) -> Self {
        self.min_extracted_chars = chars;
        self
    }
}

/// Bounds for calls that leave the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    /// Remote fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Maximum remote fetch body size.
    pub fetch_max_bytes: usize,

    /// Maximum redirects followed by the fetcher (each hop is re-validated).
    pub fetch_max_redirects: usize,

    /// External extraction tool timeout in seconds.
    pub tool_timeout_secs: u64,

    /// Maximum stdout captured from the extraction tool.
    pub tool_max_output_bytes: usize,

    /// Local AI endpoint timeout in seconds.
    pub local_ai_timeout_secs: u64,

    /// Remote AI advisor timeout in seconds.
    pub remote_ai_timeout_secs: u64,

    /// Requests allowed per caller per window.
    pub rate_limit_requests: u32,

    /// Rate limit window in seconds.
    pub rate_limit_window_secs: u64,

    /// Interval between sweeps of expired rate limit entries, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 15,
            fetch_max_bytes: 2 * 1024 * 1024,
            fetch_max_redirects: 5,
            tool_timeout_secs: 30,
            tool_max_output_bytes: 8 * 1024 * 1024,
            local_ai_timeout_secs: 120,
            remote_ai_timeout_secs: 60,
            rate_limit_requests: 30,
            rate_limit_window_secs: 60,
            sweep_interval_secs: 60,
        }
    }
}

impl ExternalConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Remote fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Extraction tool timeout.
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Local AI timeout.
    pub fn local_ai_timeout(&self) -> Duration {
        Duration::from_secs(self.local_ai_timeout_secs)
    }

    /// Remote AI timeout.
    pub fn remote_ai_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_ai_timeout_secs)
    }

    /// Rate limit window.
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Set the remote fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the remote fetch body cap.
    pub fn with_fetch_max_bytes(mut self, bytes: usize) -> Self {
        self.fetch_max_bytes = bytes;
        self
    }

    /// Set the extraction tool timeout.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the extraction tool output cap.
    pub fn with_tool_max_output_bytes(mut self, bytes: usize) -> Self {
        self.tool_max_output_bytes = bytes;
        self
    }

    /// Set the local AI timeout.
    pub fn with_local_ai_timeout(mut self, timeout: Duration) -> Self {
        self.local_ai_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the per-caller rate limit.
    pub fn with_rate_limit(mut self, requests: u32, window: Duration) -> Self {
        self.rate_limit_requests = requests;
        self.rate_limit_window_secs = window.as_secs();
        self
    }
}
