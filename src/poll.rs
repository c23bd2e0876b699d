//! Bounded retry-with-timeout
//!
//! The services under test do most of their work asynchronously, so tests
//! repeatedly check a condition at a fixed interval until it holds, fails
//! permanently or the time budget is spent. There is no backoff.
//!
//! ```no_run
//! use cloudroast::poll::{wait_for_condition, CondCheckError};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let value = wait_for_condition::<u32, std::io::Error, _, _>(
//!     || async { Err(CondCheckError::NotYet) },
//!     &Duration::from_secs(1),
//!     &Duration::from_secs(30),
//! )
//! .await;
//! assert!(value.is_err());
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Result of one condition check that did not produce a value
#[derive(Debug)]
pub enum CondCheckError<E> {
    /// Condition not met yet; check again after the interval
    NotYet,
    /// Condition can never be met; stop immediately
    Failed(E),
}

impl<E> From<E> for CondCheckError<E> {
    fn from(error: E) -> Self {
        CondCheckError::Failed(error)
    }
}

/// Polling errors
#[derive(Debug, Error)]
pub enum PollError<E: std::fmt::Display> {
    #[error("condition not met after {elapsed:?} ({attempts} attempts)")]
    TimedOut { elapsed: Duration, attempts: u32 },

    #[error("permanent error while polling: {0}")]
    PermanentError(E),
}

/// Call `check` every `interval` until it returns a value, fails, or
/// `max_wait` has elapsed.
///
/// The check always runs at least once, and once more after the deadline is
/// crossed so a condition met during the last sleep is not missed.
pub async fn wait_for_condition<T, E, F, Fut>(
    mut check: F,
    interval: &Duration,
    max_wait: &Duration,
) -> Result<T, PollError<E>>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CondCheckError<E>>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match check().await {
            Ok(value) => return Ok(value),
            Err(CondCheckError::Failed(e)) => return Err(PollError::PermanentError(e)),
            Err(CondCheckError::NotYet) => {}
        }

        let elapsed = start.elapsed();
        if elapsed >= *max_wait {
            return Err(PollError::TimedOut { elapsed, attempts });
        }

        let remaining = *max_wait - elapsed;
        tokio::time::sleep(std::cmp::min(*interval, remaining)).await;
    }
}
