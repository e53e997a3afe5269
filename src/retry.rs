//! Bounded retries with exponential backoff for ingestion requests.
//!
//! This is the inner, per-request layer. A batch that still fails after the
//! last attempt goes back to the telemetry queue and rides the next flush.

use rand::RngExt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 0 behaves like 1
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth factor between consecutive delays, at least 1.0
    pub multiplier: f64,
    /// Upper bound of the random delay added to each wait
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            max_jitter: Duration::ZERO,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Batch POSTs: one quick retry. The pipeline re-queues whatever still
    /// fails, so waiting longer here only delays the next flush.
    pub fn event_batch() -> Self {
        Self::new(2, Duration::from_millis(250))
            .with_max_delay(Duration::from_secs(1))
            .with_jitter(Duration::from_millis(100))
    }

    /// Metric beacons are dropped on failure, so they get one short retry.
    pub fn metric_beacon() -> Self {
        Self::new(2, Duration::from_millis(100)).with_max_delay(Duration::from_millis(500))
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Waits to perform between attempts, in order.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_delay.min(self.max_delay),
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            max_jitter: self.max_jitter,
            remaining: self.attempts() - 1,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::event_batch()
    }
}

/// Iterator over the delays of a [`RetryPolicy`], capped at `max_delay`
/// before jitter is added.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max_delay: Duration,
    multiplier: f64,
    max_jitter: Duration,
    remaining: u32,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let delay = self.next;
        self.next = Duration::try_from_secs_f64(self.next.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        Some(delay + jitter(self.max_jitter))
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy runs out of attempts. The last error is returned.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let attempts = policy.attempts();
    let mut delays = policy.backoff();
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{}: succeeded on attempt {}/{}", operation_name, attempt, attempts);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            debug!("{}: not retrying: {}", operation_name, err);
            return Err(err);
        }

        let Some(delay) = delays.next() else {
            warn!(
                "{}: giving up after {} attempts, last error: {}",
                operation_name, attempts, err
            );
            return Err(err);
        };

        warn!(
            "{}: attempt {}/{} failed ({}), retrying in {:?}",
            operation_name, attempt, attempts, err, delay
        );
        sleep(delay).await;
        attempt += 1;
    }
}
