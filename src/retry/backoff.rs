use std::thread::sleep;
use std::time::{Duration, Instant};

/// Fixed interval polling bounded by an absolute timeout.
///
/// There is no exponential or jittered growth: every wait between two attempts lasts exactly
/// `interval` and no new wait is started once `timeout` has elapsed since [Backoff::start].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    interval: Duration,
    timeout: Duration,
}

impl Backoff {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn with_interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Starts the clock. The returned [Attempts] owns the deadline for this sequence.
    pub fn start(self) -> Attempts {
        let started = Instant::now();
        Attempts {
            interval: self.interval,
            timeout: self.timeout,
            started,
            deadline: started + self.timeout,
            attempt: 0,
        }
    }
}

/// A running sequence of attempts with a deadline.
#[derive(Debug)]
pub struct Attempts {
    interval: Duration,
    timeout: Duration,
    started: Instant,
    deadline: Instant,
    attempt: usize,
}

impl Attempts {
    /// Registers a new attempt and returns its ordinal (starting at 1).
    pub fn next_attempt(&mut self) -> usize {
        self.attempt += 1;
        self.attempt
    }

    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// True when the attempt following the next interval would start after the deadline.
    pub fn is_last(&self) -> bool {
        Instant::now() + self.interval >= self.deadline
    }

    /// Sleeps one interval unless the deadline has already been reached.
    /// Returns false when the sequence is exhausted and no sleep happened.
    pub fn backoff(&self) -> bool {
        self.backoff_with(sleep)
    }

    pub(crate) fn backoff_with<S>(&self, sleep_func: S) -> bool
    where
        S: FnOnce(Duration),
    {
        if self.is_expired() {
            return false;
        }
        sleep_func(self.interval);
        true
    }
}
