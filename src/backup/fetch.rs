//! Fetch task
//!
//! Fetches one window's records from the data source, retrying transient
//! failures under an explicit `RetryPolicy`. Waiting between attempts goes
//! through a `Sleeper` so the policy can be exercised without real time
//! passing. A fetch never touches the filesystem.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::error::{BackupError, Result};
use crate::models::{RecordSet, TimeWindow};
use crate::source::DataSource;

/// Jitter applied to each computed backoff delay
pub type JitterFn = fn(Duration) -> Duration;

/// Uniform jitter in `[delay / 2, delay]`
pub fn equal_jitter(delay: Duration) -> Duration {
    let half = delay / 2;
    let spread = delay.saturating_sub(half).as_millis() as u64;
    if spread == 0 {
        return delay;
    }
    half + Duration::from_millis(rand::rng().random_range(0..=spread))
}

/// No jitter; the computed delay is used as is
pub fn no_jitter(delay: Duration) -> Duration {
    delay
}

/// Bounded exponential backoff for transient fetch failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first, at least 1
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay, before jitter
    pub max_delay: Duration,
    pub jitter: JitterFn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: equal_jitter,
        }
    }
}

impl RetryPolicy {
    /// Default policy with a different attempt budget
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        (self.jitter)(delay)
    }
}

/// Waits between fetch attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// One window's fetch, with retries
pub struct FetchTask<'a> {
    source: &'a dyn DataSource,
    policy: &'a RetryPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> FetchTask<'a> {
    pub fn new(source: &'a dyn DataSource, policy: &'a RetryPolicy, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            source,
            policy,
            sleeper,
        }
    }

    /// Fetch every record in the window
    ///
    /// Terminal errors are returned immediately. Transient errors are retried
    /// until `max_attempts` is reached, then reported as `RetriesExhausted`.
    pub async fn fetch(&self, window: TimeWindow) -> Result<RecordSet> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match self.source.query_range(window.start(), window.end()).await {
                Ok(records) => return Ok(records),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }

            if attempt >= max_attempts {
                return Err(BackupError::RetriesExhausted {
                    attempts: attempt,
                    last: err.to_string(),
                });
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                %window,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient fetch failure, retrying"
            );
            self.sleeper.sleep(delay).await;
        }
    }
}

/// Shared sleeper handle used by the scheduler
pub type SharedSleeper = Arc<dyn Sleeper>;
