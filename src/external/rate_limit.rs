//! Per-caller rate limiting.
//!
//! Wraps a keyed `governor` limiter. A budget of `max_requests` per `window`
//! becomes a GCRA quota with a burst of `max_requests` that refills one request
//! every `window / max_requests`. Clones share the same state.
//!
//! Callers whose budget has fully refilled are dropped by
//! [`RateLimiter::sweep`], which a background task from
//! [`RateLimiter::spawn_sweeper`] runs periodically.

use crate::config::ExternalConfig;
use crate::error::ExternalCallError;
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::Quota;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type KeyedLimiter = governor::RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Thread-safe limiter keyed by caller identity.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    inner: Arc<KeyedLimiter>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .field("callers", &self.len())
            .finish()
    }
}

/// Burst of `max_requests`, refilled evenly over `window`. A zero window
/// means no limit.
fn quota(max_requests: u32, window: Duration) -> Quota {
    let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(window / burst.get())
        .map(|q| q.allow_burst(burst))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
}

impl RateLimiter {
    /// Allow `max_requests` per caller in every `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            inner: Arc::new(KeyedLimiter::keyed(quota(max_requests, window))),
        }
    }

    /// Limiter with the configured budget.
    pub fn from_config(config: &ExternalConfig) -> Self {
        Self::new(config.rate_limit_requests, config.rate_limit_window())
    }

    /// Requests allowed per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count one request for `caller`, failing with
    /// [`ExternalCallError::RateLimited`] once the budget is spent.
    pub fn check(&self, caller: &str) -> Result<(), ExternalCallError> {
        self.inner.check_key(&caller.to_string()).map_err(|not_until| {
            let retry_after = not_until.wait_time_from(DefaultClock::default().now());
            log::debug!("rate limited {} for {:?}", caller, retry_after);
            ExternalCallError::RateLimited { retry_after }
        })
    }

    /// Drop callers whose budget has fully refilled. Returns how many were
    /// removed.
    pub fn sweep(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain_recent();
        before.saturating_sub(self.inner.len())
    }

    /// Number of tracked callers.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no caller is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep every `interval` on the current tokio runtime. The task ends once
    /// every clone of this limiter has been dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = inner.upgrade() else {
                    break;
                };
                limiter.retain_recent();
            }
        })
    }
}
