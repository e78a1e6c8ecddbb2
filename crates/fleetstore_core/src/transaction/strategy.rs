//! Retry-capable execution strategy.

use crate::config::RetryConfig;
use crate::error::{CoreError, CoreResult};
use std::thread;
use tracing::warn;

/// Re-runs a unit of work after transient store failures.
///
/// The operation is invoked again from the start, so it must be safe to
/// repeat. Only errors for which [`CoreError::is_transient`] holds are
/// retried; every other error is returned on the spot.
#[derive(Debug, Clone)]
pub struct ExecutionStrategy {
    retry: RetryConfig,
}

impl ExecutionStrategy {
    /// Creates a strategy with the given retry policy.
    #[must_use]
    pub fn new(retry: RetryConfig) -> Self {
        Self { retry }
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Runs `operation`, passing the 0-based attempt number.
    ///
    /// After the last allowed attempt fails transiently the error is wrapped
    /// in `RetryLimitExceeded`. A policy of one attempt or fewer never
    /// retries and returns the original error.
    pub fn execute<R, F>(&self, mut operation: F) -> CoreResult<R>
    where
        F: FnMut(u32) -> CoreResult<R>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let delay = self.retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                thread::sleep(delay);
            }

            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) if max_attempts == 1 => return Err(err),
                Err(err) if attempt + 1 >= max_attempts => {
                    warn!(attempts = attempt + 1, error = %err, "giving up after transient failures");
                    return Err(CoreError::RetryLimitExceeded {
                        attempts: attempt + 1,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    warn!(attempt = attempt + 1, error = %err, "transient failure, retrying");
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
