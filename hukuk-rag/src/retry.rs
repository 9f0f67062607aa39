//! Retry with exponential backoff for calls to the remote model service.
//!
//! Rate-limit failures wait a larger multiple of the current delay than
//! other transient failures, so a throttled upstream gets room to recover.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Attempt count and delay schedule for one kind of upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Growth factor applied to the delay after every failed attempt.
    pub backoff_factor: u32,
    /// Extra multiplier applied to the wait when the failure is a rate limit.
    pub rate_limit_multiplier: u32,
    /// Upper bound for any single wait, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::query()
    }
}

impl RetryPolicy {
    /// Policy for batch embedding during ingestion: five attempts.
    pub fn ingestion() -> Self {
        Self { max_attempts: 5, ..Self::query() }
    }

    /// Policy for embedding a single user query: three attempts.
    pub fn query() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_factor: 2,
            rate_limit_multiplier: 5,
            max_delay_ms: 60_000,
        }
    }

    /// A policy that never waits. Useful for tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, initial_delay_ms: 0, ..Self::query() }
    }

    /// Set the number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    /// The wait after failed attempt number `attempt` (1-based).
    pub fn wait_after(&self, attempt: u32, rate_limited: bool) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let mut millis = self
            .initial_delay_ms
            .saturating_mul(u64::from(self.backoff_factor).saturating_pow(exponent));
        if rate_limited {
            millis = millis.saturating_mul(u64::from(self.rate_limit_multiplier));
        }
        Duration::from_millis(millis.min(self.max_delay_ms))
    }

    /// Run `operation` until it succeeds or the attempts are used up.
    ///
    /// The closure receives the 1-based attempt number. Every failure is
    /// logged as a warning; the last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let rate_limited = e.is_rate_limited();
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        rate_limited,
                        error = %e,
                        "upstream call failed"
                    );
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                    tokio::time::sleep(self.wait_after(attempt, rate_limited)).await;
                    attempt += 1;
                }
            }
        }
    }
}
