//! Waiting on AWS.
//!
//! Two loops are shared by the resources: re-issuing a mutation that AppSync rejected
//! because another one was in flight, and polling a describe call until the remote
//! object reaches a target status.

use std::cmp::min;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::ProviderError;

/// How long a mutation is retried on concurrent modification.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Call `op` until it stops failing with [`ProviderError::ConcurrentModification`].
///
/// Sleeps with a doubling backoff (capped at 10s) between attempts. Once `timeout`
/// has elapsed the last error is returned. Any other outcome is returned as is.
pub async fn retry_on_concurrent_modification<T, F, Fut>(
    what: &str,
    timeout: Duration,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let start = Instant::now();
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1u32;

    loop {
        match op().await {
            Err(err) if err.is_concurrent_modification() => {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    return Err(err);
                }
                debug!(what, attempt, ?backoff, "concurrent modification, retrying");
                tokio::time::sleep(min(backoff, timeout - elapsed)).await;
                backoff = min(backoff * 2, MAX_BACKOFF);
                attempt += 1;
            },
            result => return result,
        }
    }
}

/// Parameters for [`wait_for_status`].
#[derive(Debug, Clone)]
pub struct StatusWait {
    /// Statuses that mean "keep polling".
    pub pending: &'static [&'static str],
    /// Statuses that end the wait successfully. Empty means "wait until gone".
    pub target: &'static [&'static str],
    /// Overall deadline.
    pub timeout: Duration,
    /// Sleep before the first poll.
    pub delay: Duration,
    /// Sleep between polls.
    pub poll_interval: Duration,
    /// Consecutive "not found" results tolerated before giving up.
    pub not_found_checks: u32,
}

impl StatusWait {
    /// Wait for one of `target` while the status is one of `pending`.
    pub fn new(
        pending: &'static [&'static str],
        target: &'static [&'static str],
        timeout: Duration,
    ) -> Self {
        Self {
            pending,
            target,
            timeout,
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(5),
            not_found_checks: 20,
        }
    }

    /// Wait until the object disappears while the status is one of `pending`.
    pub fn gone(pending: &'static [&'static str], timeout: Duration) -> Self {
        Self::new(pending, &[], timeout)
    }

    /// Set the sleep before the first poll.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the sleep between polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Poll `refresh` until the object reaches a target status.
///
/// `refresh` returns the object with its current status, or `None` when it does not
/// exist. Returns `Ok(None)` when `target` is empty and the object is gone.
pub async fn wait_for_status<T, F, Fut>(
    what: &str,
    wait: &StatusWait,
    mut refresh: F,
) -> Result<Option<T>, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<(T, String)>, ProviderError>>,
{
    let start = Instant::now();
    let mut misses = 0u32;
    let mut last_status = String::new();

    tokio::time::sleep(wait.delay).await;

    loop {
        match refresh().await? {
            None if wait.target.is_empty() => {
                info!(what, "deleted");
                return Ok(None);
            },
            None => {
                misses += 1;
                if misses >= wait.not_found_checks {
                    return Err(ProviderError::NotFound(format!(
                        "{what} not found after {misses} checks"
                    )));
                }
                debug!(what, misses, "not found yet");
            },
            Some((value, status)) => {
                misses = 0;
                if wait.target.contains(&status.as_str()) {
                    info!(what, %status, "reached target status");
                    return Ok(Some(value));
                }
                if !wait.pending.contains(&status.as_str()) {
                    return Err(ProviderError::FailedPrecondition(format!(
                        "unexpected state '{status}' for {what}, wanted target '{}'",
                        wait.target.join(", ")
                    )));
                }
                debug!(what, %status, "waiting");
                last_status = status;
            },
        }

        let elapsed = start.elapsed();
        if elapsed >= wait.timeout {
            let target = if wait.target.is_empty() {
                "deleted".to_string()
            } else {
                wait.target.join(", ")
            };
            return Err(ProviderError::DeadlineExceeded(format!(
                "timeout while waiting for {what} to become '{target}' (last state: '{last_status}', timeout: {:?})",
                wait.timeout
            )));
        }
        tokio::time::sleep(min(wait.poll_interval, wait.timeout - elapsed)).await;
    }
}
