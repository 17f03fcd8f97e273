//! Rate limiting and retry logic for model API calls
//!
//! Exponential backoff with jitter for rate limits (429) and server errors
//! (5xx). Tool invocations never go through here.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Backoff parameters
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Delay before attempt `attempt + 1` (0-based), with up to 25% jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_ms = (exp.as_millis() as u64) / 4;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        exp + Duration::from_millis(jitter)
    }
}

/// Errors that know whether another attempt could succeed
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for anyhow::Error {
    fn is_retryable(&self) -> bool {
        if let Some(api) = self.downcast_ref::<ApiStatusError>() {
            return is_retryable_status(api.status);
        }
        if let Some(req) = self.downcast_ref::<reqwest::Error>() {
            return req.is_timeout() || req.is_connect();
        }
        false
    }
}

/// Non-success HTTP status from a provider
#[derive(Debug, thiserror::Error)]
#[error("API error {status}: {body}")]
pub struct ApiStatusError {
    pub status: u16,
    pub body: String,
}

/// 429 and the transient 5xx family
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504 | 529)
}

/// Run `op` until it succeeds, fails with a non-retryable error, or runs out of attempts
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
    E: IsRetryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < config.max_attempts => {
                let delay = config.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retryable API error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
