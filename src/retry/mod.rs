//! Runs an operation and re-invokes it when a classifier says the failure is transient.
//!
//! The error returned to the caller is always the one produced by the last attempt, unchanged.
use std::fmt::Display;
use std::time::Duration;

use tracing::{debug, warn};

use backoff::Backoff;

pub mod backoff;
pub mod classifier;

/// Retries after the first attempt used around single remote calls.
pub const DEFAULT_MAX_RETRIES: usize = 1;

/// Capacity-aware creation retries every 30s for up to 30 minutes.
pub const CAPACITY_RETRY_INTERVAL: Duration = Duration::from_secs(30);
pub const CAPACITY_RETRY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Re-invokes without delay, at most `max_retries` times after the first attempt.
    Immediate { max_retries: usize },
    /// Re-invokes after each interval until the backoff deadline is reached.
    FixedInterval(Backoff),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Immediate {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    pub fn capacity() -> Self {
        Self::FixedInterval(Backoff::new(CAPACITY_RETRY_INTERVAL, CAPACITY_RETRY_TIMEOUT))
    }
}

/// Result of a single attempt after classification.
#[derive(Debug, PartialEq)]
pub enum Outcome<T, E> {
    Success(T),
    Retryable(E),
    Fatal(E),
}

impl<T, E> Outcome<T, E> {
    pub fn classify<C>(result: Result<T, E>, classifier: C) -> Self
    where
        C: Fn(&E) -> bool,
    {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) if classifier(&err) => Self::Retryable(err),
            Err(err) => Self::Fatal(err),
        }
    }
}

/// Executes `f` and re-invokes it immediately, up to `max_retries` times, as long as
/// `classifier` marks the failure as retryable.
pub fn retry<F, T, E, C>(max_retries: usize, f: F, classifier: C) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    C: Fn(&E) -> bool,
    E: Display,
{
    retry_with_policy(RetryPolicy::Immediate { max_retries }, f, classifier)
}

pub fn retry_with_policy<F, T, E, C>(policy: RetryPolicy, mut f: F, classifier: C) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    C: Fn(&E) -> bool,
    E: Display,
{
    match policy {
        RetryPolicy::Immediate { max_retries } => {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match Outcome::classify(f(), &classifier) {
                    Outcome::Success(value) => return Ok(value),
                    Outcome::Retryable(err) if attempt <= max_retries => {
                        debug!(%err, "[{attempt}/{}] attempt failed, retrying", max_retries + 1);
                    }
                    Outcome::Retryable(err) => return Err(err),
                    Outcome::Fatal(err) => {
                        warn!(%err, "not going to retry");
                        return Err(err);
                    }
                }
            }
        }
        RetryPolicy::FixedInterval(backoff) => {
            let mut attempts = backoff.start();
            loop {
                let attempt = attempts.next_attempt();
                match Outcome::classify(f(), &classifier) {
                    Outcome::Success(value) => return Ok(value),
                    Outcome::Retryable(err) => {
                        debug!(%err, "attempt {attempt} failed, retrying in {:?}", backoff.interval());
                        if !attempts.backoff() {
                            debug!(
                                "giving up after {attempt} attempts in {:?}",
                                attempts.elapsed()
                            );
                            return Err(err);
                        }
                    }
                    Outcome::Fatal(err) => {
                        warn!(%err, "not going to retry");
                        return Err(err);
                    }
                }
            }
        }
    }
}
