use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// Attempt budget and fixed delays. No jitter is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub delay: Duration,
    /// Used instead of `delay` after a rate-limited attempt.
    pub rate_limit_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            rate_limit_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    settings: RetrySettings,
}

impl RetryPolicy {
    pub fn new(settings: RetrySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RetrySettings {
        &self.settings
    }

    fn delay_for(&self, err: &ClientError) -> Duration {
        match err.class() {
            maxbot_core::ErrorClass::RateLimited => self.settings.rate_limit_delay,
            _ => self.settings.delay,
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The most recent error is returned as-is.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                outcome = op() => outcome,
            };
            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                debug!(attempt, error = %err, "not retrying request");
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %err, "request failed after retries");
                return Err(err);
            }

            let delay = self.delay_for(&err);
            counter!("maxbot_retries_total", "class" => err.class().as_str()).increment(1);
            info!(attempt, max_attempts, ?delay, error = %err, "retrying request");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
    }
}
