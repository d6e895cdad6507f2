//! Bounded exponential-backoff retry for connectivity faults.
//!
//! Used when acquiring the database connection and the browser session at
//! the start of a run. Gives up after `max_attempts` or once the hard
//! deadline has passed, whichever comes first.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;

/// Retry policy for connection acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after every failed attempt.
    pub multiplier: f64,
    /// Upper bound for a single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Hard deadline for the whole operation, in seconds.
    pub deadline_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            deadline_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exp);
        Duration::from_millis(millis.min(self.max_delay_ms as f64) as u64)
    }

    /// Hard deadline, never shorter than one second.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs.max(1))
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// Each attempt is also bounded by the time left before the deadline, so a
/// hanging connect cannot outlive the policy.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let deadline = policy.deadline();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let remaining = deadline.saturating_sub(started.elapsed());

        let last_error = match tokio::time::timeout(remaining, op()).await {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    debug!("{} ready after {} attempts", what, attempt);
                }
                return Ok(value);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", deadline),
        };

        let delay = policy.delay_after(attempt);
        let out_of_time = started.elapsed() + delay >= deadline;
        if attempt >= max_attempts || out_of_time {
            return Err(Error::Unavailable {
                what: what.to_string(),
                attempts: attempt,
                last_error,
            });
        }

        warn!(
            "{} unavailable (attempt {}/{}): {}. Retrying in {:?}",
            what, attempt, max_attempts, last_error, delay
        );
        tokio::time::sleep(delay).await;
    }
}
