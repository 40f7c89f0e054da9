//! Bounded retry with linear backoff around a single upstream call.

use std::time::Duration;

use nbproxy_common::GlobalConfig;
use tracing::{info, warn};

use crate::upstream::{UpstreamClient, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse};

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504) || (500..=599).contains(&status)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    pub base_delay: Duration,
    /// Upper bound of the uniform random offset added to each delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: nbproxy_common::DEFAULT_RETRIES,
            base_delay: Duration::from_millis(nbproxy_common::DEFAULT_BASE_DELAY_MS),
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn primary(config: &GlobalConfig) -> Self {
        Self {
            retries: config.retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    pub fn fallback(config: &GlobalConfig) -> Self {
        Self {
            retries: config.fallback_retries,
            ..Self::primary(config)
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before the attempt following `attempt_index` (zero-based).
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let linear = self.base_delay.saturating_mul(attempt_index.saturating_add(1));
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return linear;
        }
        let offset = rand::random_range(0..=jitter_ms);
        linear.saturating_add(Duration::from_millis(offset))
    }
}

/// Per-call retry bookkeeping.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_final(&self) -> bool {
        self.attempt + 1 >= self.policy.max_attempts()
    }

    /// Moves to the next attempt, returning the delay to wait before it.
    pub fn advance(&mut self) -> Duration {
        let delay = self.policy.delay_for(self.attempt);
        self.attempt += 1;
        delay
    }
}

/// Sends `req`, retrying retryable statuses and transport failures.
///
/// A retryable response on the final attempt is handed back as `Ok`; a
/// transport failure on the final attempt is handed back as `Err`.
pub async fn send_with_retry(
    client: &dyn UpstreamClient,
    req: &UpstreamHttpRequest,
    policy: RetryPolicy,
) -> Result<UpstreamHttpResponse, UpstreamFailure> {
    let mut state = RetryState::new(policy);
    loop {
        let attempt = state.attempt();
        match client.send(req.clone()).await {
            Ok(resp) => {
                if !is_retryable_status(resp.status) || state.is_final() {
                    return Ok(resp);
                }
                let delay = state.advance();
                info!(
                    event = "upstream_retry",
                    url = %req.url,
                    attempt = attempt,
                    status = resp.status,
                    delay_ms = delay.as_millis() as u64
                );
                sleep_nonzero(delay).await;
            }
            Err(failure) => {
                if state.is_final() {
                    return Err(failure);
                }
                let delay = state.advance();
                warn!(
                    event = "upstream_retry",
                    url = %req.url,
                    attempt = attempt,
                    kind = ?failure.kind,
                    error = %failure,
                    delay_ms = delay.as_millis() as u64
                );
                sleep_nonzero(delay).await;
            }
        }
    }
}

async fn sleep_nonzero(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
