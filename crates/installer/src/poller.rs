//! Bounded polling for eventually-consistent resources.
//!
//! Delays are constant. There is no backoff.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{InstallerError, Result};

/// Attempt bound and delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl PollPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Same bound, no sleeping.
    #[must_use]
    pub const fn immediate(self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            delay: Duration::ZERO,
        }
    }
}

/// Call `check` until it returns `Ok(true)`, at most `policy.max_attempts` times.
///
/// The first call happens immediately and counts as an attempt. There is no
/// sleep after the final attempt. An `Err` from `check` is returned as is.
///
/// Returns the number of checks performed.
///
/// # Errors
///
/// Returns `Timeout` when every attempt reported not-ready.
pub fn poll_until<F>(what: &str, policy: PollPolicy, mut check: F) -> Result<u32>
where
    F: FnMut() -> Result<bool>,
{
    let start = Instant::now();

    for attempt in 1..=policy.max_attempts {
        if check()? {
            debug!(what, attempt, "Ready");
            return Ok(attempt);
        }
        if attempt < policy.max_attempts {
            debug!(
                what,
                attempt,
                max_attempts = policy.max_attempts,
                "Not ready, waiting {:?}",
                policy.delay
            );
            std::thread::sleep(policy.delay);
        }
    }

    Err(InstallerError::Timeout {
        what: what.to_string(),
        attempts: policy.max_attempts,
        elapsed: start.elapsed(),
    })
}

/// Call `check` every `interval` until it returns `Ok(true)` or `timeout` elapses.
///
/// # Errors
///
/// Returns `Timeout` once the elapsed time reaches `timeout` without success.
pub fn poll_until_elapsed<F>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<Duration>
where
    F: FnMut() -> Result<bool>,
{
    let start = Instant::now();
    let mut attempts = 0_u32;

    loop {
        attempts += 1;
        if check()? {
            let elapsed = start.elapsed();
            debug!(what, attempts, ?elapsed, "Ready");
            return Ok(elapsed);
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(InstallerError::Timeout {
                what: what.to_string(),
                attempts,
                elapsed,
            });
        }

        debug!(what, attempts, ?elapsed, "Not ready, waiting {interval:?}");
        std::thread::sleep(interval);
    }
}
