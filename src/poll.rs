//! Bounded retry/poll primitive shared by every browser interaction.
//!
//! [`poll_until`] keeps re-running an async attempt on a fixed interval until
//! it succeeds or the deadline passes. It never blocks past the deadline and
//! reports the last failure so callers can decide whether a timeout is fatal.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Interval and deadline for a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    /// One-second polling, the cadence used for every UI step.
    pub fn every_second(timeout: Duration) -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout,
        }
    }
}

/// Returned when the watched condition never held within the policy timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTimeout {
    pub waited: Duration,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl fmt::Display for PollTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gave up after {:.1}s and {} attempts",
            self.waited.as_secs_f64(),
            self.attempts
        )?;
        if let Some(last) = &self.last_error {
            write!(f, " (last error: {})", last)?;
        }
        Ok(())
    }
}

impl std::error::Error for PollTimeout {}

/// Run `attempt` until it returns `Ok`, sleeping `policy.interval` between
/// tries. At least one attempt is always made.
pub async fn poll_until<T, E, F, Fut>(policy: PollPolicy, mut attempt: F) -> Result<T, PollTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let last_error = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => e.to_string(),
        };
        tracing::trace!(attempts, error = %last_error, "poll attempt failed");

        sleep(policy.interval).await;
        if Instant::now() > deadline {
            return Err(PollTimeout {
                waited: started.elapsed(),
                attempts,
                last_error: Some(last_error),
            });
        }
    }
}
