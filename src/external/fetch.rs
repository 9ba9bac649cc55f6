//! Server-side fetch of a remote page (e.g. a job posting) as sanitized text.

use super::rate_limit::RateLimiter;
use super::url_guard::{validate_target_url, validate_with_dns};
use crate::config::ExternalConfig;
use crate::decoders::html_to_text;
use crate::decoders::encoding::{decode_bytes, normalize_newlines};
use crate::error::ExternalCallError;
use std::time::Duration;

/// Content types the fetcher accepts.
const TEXT_TYPES: &[&str] = &[
    "text/",
    "application/xhtml+xml",
    "application/xml",
    "application/json",
];

/// A fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedContent {
    /// Final URL after redirects
    pub url: String,
    /// Response content type (lowercased, without parameters)
    pub content_type: String,
    /// Sanitized text (HTML reduced to its visible text)
    pub text: String,
    /// Whether the body hit the size cap
    pub truncated: bool,
}

/// HTTP fetcher with SSRF validation on every hop and per-caller rate limits.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
    max_bytes: usize,
    timeout: Duration,
}

impl RemoteFetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: &ExternalConfig) -> Result<Self, ExternalCallError> {
        let max_redirects = config.fetch_max_redirects;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= max_redirects {
                return attempt.error(ExternalCallError::blocked("too many redirects"));
            }
            match validate_target_url(attempt.url().as_str()) {
                Ok(_) => attempt.follow(),
                Err(e) => attempt.error(e),
            }
        });
        let client = reqwest::Client::builder()
            .redirect(policy)
            .timeout(config.fetch_timeout())
            .user_agent(concat!("careermask/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExternalCallError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            limiter: RateLimiter::from_config(config),
            max_bytes: config.fetch_max_bytes,
            timeout: config.fetch_timeout(),
        })
    }

    /// Share an existing limiter (e.g. with the extraction endpoint).
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// The limiter applied to callers.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Fetch `url` on behalf of `caller`.
    pub async fn fetch(&self, caller: &str, url: &str) -> Result<FetchedContent, ExternalCallError> {
        self.limiter.check(caller)?;
        let target = validate_with_dns(url).await?;
        log::debug!("fetching {} for {}", target, caller);

        let mut response = self.client.get(target).send().await.map_err(|e| {
            if e.is_redirect() {
                log::warn!("redirect from {} rejected: {}", url, e);
                ExternalCallError::blocked(format!("redirect rejected: {}", e))
            } else {
                super::map_reqwest_error(e, self.timeout)
            }
        })?;

        // Redirects were checked hop by hop; check where we landed too
        let final_url = validate_target_url(response.url().as_str())?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("fetch of {} returned {}", final_url, status);
            return Err(ExternalCallError::UpstreamStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .unwrap_or_default();
        if !is_text_type(&content_type) {
            return Err(ExternalCallError::blocked(format!(
                "content type '{}' is not text",
                content_type
            )));
        }

        let mut body = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| super::map_reqwest_error(e, self.timeout))?
        {
            let room = self.max_bytes.saturating_sub(body.len());
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }
        if truncated {
            trim_partial_utf8(&mut body);
        }

        let text = sanitize(&body, &content_type);
        Ok(FetchedContent {
            url: final_url.to_string(),
            content_type,
            text,
            truncated,
        })
    }
}

fn is_text_type(content_type: &str) -> bool {
    TEXT_TYPES.iter().any(|t| content_type.starts_with(t))
}

/// Drop an incomplete UTF-8 sequence left at the end by the size cap.
fn trim_partial_utf8(body: &mut Vec<u8>) {
    if let Err(e) = std::str::from_utf8(body) {
        if e.error_len().is_none() {
            body.truncate(e.valid_up_to());
        }
    }
}

/// Decode the body and strip markup from HTML.
fn sanitize(body: &[u8], content_type: &str) -> String {
    let (text, _) = decode_bytes(body);
    if content_type.contains("html") {
        html_to_text(&text)
    } else {
        normalize_newlines(&text)
    }
}
