//! Bounded Retry Policy
//!
//! Wraps a backend call with exponential backoff. Only transient errors
//! (timeouts, connection failures, rate limits, 5xx) are retried; anything
//! else is returned immediately.

use std::future::Future;

use crate::backend::BackendError;
use crate::config::RetryConfig;

/// Retry wrapper for backend calls
#[derive(Clone, Debug, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Policy that never retries
    #[must_use]
    pub fn none() -> Self {
        Self::new(RetryConfig::disabled())
    }

    /// Maximum number of retries after the first attempt
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `op`.
    pub async fn run<T, F, Fut>(&self, backend: &str, mut op: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_transient() || attempt >= self.config.max_retries {
                        return Err(e);
                    }

                    let backoff = self.config.backoff_for_attempt(attempt);
                    tracing::debug!(
                        backend,
                        attempt = attempt + 1,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retrying backend call"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
