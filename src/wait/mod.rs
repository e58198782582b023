//! Condition poller: repeatedly fetches the state of a remote resource until a condition holds
//! or the deadline elapses.
//!
//! Probes are invoked strictly one after the other and every decision is taken on the snapshot
//! fetched in the same iteration, so a success is never reported from stale state.
use std::fmt::Debug;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::retry::backoff::Backoff;

pub mod dns;

/// Result of a single check. `Pending` carries the state observed so it can be reported on timeout.
#[derive(Debug, Clone, PartialEq)]
pub enum Poll<T, S = T> {
    Ready(T),
    Pending(S),
}

#[derive(Error, Debug)]
pub enum WaitError<S, E> {
    #[error(
        "timed out after {elapsed:?} (timeout {timeout:?}, {attempts} attempts) waiting for {description}, last observed state: {last:?}"
    )]
    Timeout {
        description: String,
        timeout: Duration,
        elapsed: Duration,
        attempts: usize,
        last: Option<S>,
    },

    #[error(transparent)]
    Probe(E),
}

impl<S, E> WaitError<S, E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Last state observed before the timeout, if the probe ever returned one.
    pub fn last_observed(&self) -> Option<&S> {
        match self {
            Self::Timeout { last, .. } => last.as_ref(),
            Self::Probe(_) => None,
        }
    }

    pub fn into_last_observed(self) -> Option<S> {
        match self {
            Self::Timeout { last, .. } => last,
            Self::Probe(_) => None,
        }
    }
}

/// Calls `check` every `backoff.interval()` until it returns [Poll::Ready] or `backoff.timeout()`
/// elapses.
///
/// `check` receives `true` when the next attempt would start after the deadline. Errors returned
/// by `check` are terminal and propagated as [WaitError::Probe] without further attempts.
pub fn wait_for<T, S, E, F>(
    description: impl AsRef<str>,
    backoff: Backoff,
    mut check: F,
) -> Result<T, WaitError<S, E>>
where
    F: FnMut(bool) -> Result<Poll<T, S>, E>,
{
    let description = description.as_ref();
    let mut attempts = backoff.start();

    debug!("waiting for {description}");
    loop {
        let attempt = attempts.next_attempt();
        let state = match check(attempts.is_last()).map_err(WaitError::Probe)? {
            Poll::Ready(value) => {
                debug!(
                    attempt,
                    "{description} completed after {:?}",
                    attempts.elapsed()
                );
                return Ok(value);
            }
            Poll::Pending(state) => state,
        };

        if !attempts.backoff() {
            info!(attempt, "gave up waiting for {description}");
            return Err(WaitError::Timeout {
                description: description.to_string(),
                timeout: attempts.timeout(),
                elapsed: attempts.elapsed(),
                attempts: attempt,
                last: Some(state),
            });
        }
    }
}

/// Polls `probe` until `predicate` holds for the fetched state and returns that state.
pub fn wait_until<S, E, F, P>(
    description: impl AsRef<str>,
    backoff: Backoff,
    mut probe: F,
    predicate: P,
) -> Result<S, WaitError<S, E>>
where
    F: FnMut() -> Result<S, E>,
    P: Fn(&S) -> bool,
    S: Debug,
{
    wait_for(description, backoff, |_| {
        let state = probe()?;
        debug!(?state, "fetched state");
        if predicate(&state) {
            Ok(Poll::Ready(state))
        } else {
            Ok(Poll::Pending(state))
        }
    })
}

/// Polls `probe` until it reports the resource as absent (`None`).
pub fn wait_until_absent<S, E, F>(
    description: impl AsRef<str>,
    backoff: Backoff,
    mut probe: F,
) -> Result<(), WaitError<S, E>>
where
    F: FnMut() -> Result<Option<S>, E>,
    S: Debug,
{
    wait_for(description, backoff, |_| match probe()? {
        None => Ok(Poll::Ready(())),
        Some(state) => {
            debug!(?state, "resource still exists");
            Ok(Poll::Pending(state))
        }
    })
}
