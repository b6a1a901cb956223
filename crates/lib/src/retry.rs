//! Bounded retry with exponential backoff for transient provider failures.

use crate::llm::ProviderError;
use std::future::Future;
use std::time::Duration;

/// Longest shift applied to the base delay (base * 64).
const MAX_BACKOFF_SHIFT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn from_config(retry: &crate::config::RetryConfig) -> Self {
        Self {
            max_retries: retry.max_retries,
            base_delay: Duration::from_millis(retry.base_delay_ms),
        }
    }

    /// Delay before retry number `retry` (0-based): base * 2^retry.
    pub fn backoff(&self, retry: u32) -> Duration {
        let multiplier = 1_u32 << retry.min(MAX_BACKOFF_SHIFT);
        self.base_delay.saturating_mul(multiplier)
    }

    /// Run `op` until it succeeds, fails terminally, or retries are exhausted.
    /// Only transient errors are retried; the last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    let delay = self.backoff(retry);
                    log::warn!(
                        "provider call failed transiently (retry {} of {} in {:?}): {}",
                        retry + 1,
                        self.max_retries,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
