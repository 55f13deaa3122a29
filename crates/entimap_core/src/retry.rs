//! Bounded exponential retry around a single store call.

use entimap_store::{StoreError, StoreResult};
use std::time::Duration;
use tracing::warn;

/// Retry schedule for store calls.
///
/// A call is attempted once, then retried up to `max_retries` times. The
/// delay before the first retry is `initial_delay` and doubles after each
/// further failure. There is no jitter and no budget shared between
/// callers; each call sleeps on its own thread.
///
/// Only errors for which [`StoreError::is_retryable`] holds are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

impl RetryPolicy {
    /// Creates a policy with the default 250 ms initial delay.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(250),
        }
    }

    /// Creates a policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Total number of attempts, first call included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay slept before `attempt` (0-indexed). The first attempt has none.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        match 2u32.checked_pow(attempt - 1) {
            Some(factor) => self.initial_delay.saturating_mul(factor),
            None => Duration::MAX,
        }
    }

    /// Runs `call` until it succeeds or the budget is spent, returning the
    /// last error on exhaustion.
    ///
    /// # Errors
    ///
    /// Returns the last store error once attempts are exhausted, or the
    /// first non-retryable error.
    pub fn run_strict<T, F>(&self, operation: &str, mut call: F) -> StoreResult<T>
    where
        F: FnMut() -> StoreResult<T>,
    {
        let max_attempts = self.max_attempts();
        let mut last_error: Option<StoreError> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                std::thread::sleep(self.delay_for_attempt(attempt));
            }

            match call() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts,
                        next_delay_ms = self.delay_for_attempt(attempt + 1).as_millis() as u64,
                        error = %e,
                        "store call failed, retrying"
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "store call failed, giving up"
                    );
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| StoreError::unavailable("no attempts made")))
    }

    /// Runs `call` like [`Self::run_strict`] but absorbs the final error.
    ///
    /// Returns `None` when the call never succeeded.
    pub fn run_soft<T, F>(&self, operation: &str, call: F) -> Option<T>
    where
        F: FnMut() -> StoreResult<T>,
    {
        self.run_strict(operation, call).ok()
    }
}
