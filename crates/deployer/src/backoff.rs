//! Readiness polling with exponential backoff.
//!
//! Freshly launched resources are not immediately usable: an EC2 instance
//! has no private address until it is scheduled, and may not even be visible
//! to `DescribeInstances` for a moment. [`poll_until`] re-fetches the
//! resource, doubling the wait after each miss, until it is ready or the
//! configured bounds run out.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{DeployError, Result};

/// Backoff configuration for readiness polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Maximum number of queries before giving up.
    pub max_attempts: u32,
    /// Delay after the first unsuccessful query, in milliseconds.
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after every unsuccessful query.
    pub backoff_multiplier: f64,
    /// Upper bound on total time spent waiting, in seconds.
    pub timeout_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            initial_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            timeout_secs: 1_800,
        }
    }
}

impl BackoffConfig {
    /// Delay after the first unsuccessful query.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Upper bound on total waiting time.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the policy can make progress.
    ///
    /// # Errors
    /// Returns [`DeployError::Config`] for a zero attempt count, a zero initial
    /// delay, or a multiplier that is not finite or would not grow the delay.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DeployError::Config("poll.max_attempts must be at least 1".into()));
        }
        if self.initial_delay_ms == 0 {
            return Err(DeployError::Config("poll.initial_delay_ms must be positive".into()));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 1.0 {
            return Err(DeployError::Config(
                "poll.backoff_multiplier must be a finite number greater than 1".into(),
            ));
        }
        Ok(())
    }

    /// The sequence of waits this policy sleeps between queries.
    ///
    /// Yields at most `max_attempts - 1` waits and stops early once the next
    /// wait no longer fits in a [`Duration`].
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial_delay()), |delay| {
            Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff_multiplier).ok()
        })
        .take(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Poll `fetch` until it yields a snapshot for which `ready` holds.
///
/// `fetch` returns `Ok(None)` while the resource is not yet visible; that
/// counts as not ready. Errors from `fetch` are returned as-is without retry.
/// Each attempt issues exactly one `fetch`. Exhausting `max_attempts`, or a
/// wait that would exceed the timeout, fails with
/// [`DeployError::ProvisioningTimeout`].
///
/// # Errors
/// Propagates `fetch` errors and reports exhausted bounds as a timeout.
pub async fn poll_until<T, F, Fut, P>(
    config: &BackoffConfig,
    resource: &str,
    mut fetch: F,
    ready: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
    P: Fn(&T) -> bool,
{
    let start = Instant::now();
    let timeout = config.timeout();
    let mut delays = config.delays();
    let mut attempt = 0;

    loop {
        attempt += 1;
        if let Some(snapshot) = fetch().await? {
            if ready(&snapshot) {
                info!(resource, attempt, elapsed = ?start.elapsed(), "Resource ready");
                return Ok(snapshot);
            }
        }

        let elapsed = start.elapsed();
        let next = delays.next().filter(|delay| {
            elapsed
                .checked_add(*delay)
                .is_some_and(|deadline| deadline <= timeout)
        });
        let Some(delay) = next else {
            return Err(DeployError::ProvisioningTimeout {
                resource: resource.to_string(),
                attempts: attempt,
                elapsed,
            });
        };

        debug!(
            resource,
            attempt,
            delay = ?delay,
            "Resource not ready, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
