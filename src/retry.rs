//! Retry logic: countdown retries and bounded exponential backoff
//!
//! Two strategies live here:
//!
//! - [`CountdownRetrier`] retries indefinitely. After each failure it counts
//!   down a fixed number of ticks, reporting every tick to a [`RetryObserver`],
//!   then tries again. Used for address resolution, where the user watches a
//!   "retrying in N s" line until it works or they remove the task.
//! - [`retry_with_backoff`] retries a bounded number of times with exponential
//!   backoff and optional jitter, for transient transfer failures.
//!
//! Both take a [`CancellationToken`]. Cancellation preempts the running
//! operation and any pending sleep, and is never reported as a failure.
//!
//! # Example
//!
//! ```no_run
//! use bili_dl_core::retry::{CountdownRetrier, RetryObserver, RetryOutcome, RetryState};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! struct PrintTicks;
//!
//! impl RetryObserver<String> for PrintTicks {
//!     fn on_tick(&mut self, state: &RetryState) {
//!         println!("retrying in {}s", state.remaining_secs);
//!     }
//! }
//!
//! # async fn example() {
//! let retrier = CountdownRetrier::new(5, Duration::from_secs(1));
//! let cancel = CancellationToken::new();
//! let outcome = retrier
//!     .run(&cancel, &mut PrintTicks, || async { Ok::<_, String>("resolved") })
//!     .await;
//! assert_eq!(outcome, RetryOutcome::Succeeded("resolved"));
//! # }
//! ```

use crate::config::{BackoffConfig, RetryConfig};
use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, connection resets, a stream that broke
/// off) should return `true`. Permanent failures (bad configuration, a merge
/// that produced garbage, cancellation) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            // Address resolution and transfers fail transiently by nature
            Error::Analysis(_) | Error::Transfer(_) => true,
            Error::Merge(_) => false,
            Error::Task(_) | Error::NotFound(_) => false,
            Error::Config { .. } => false,
            Error::Serialization(_) => false,
            Error::Cancelled => false,
            Error::Other(_) => false,
        }
    }
}

/// Result of a cancellable retry sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// The operation eventually succeeded
    Succeeded(T),
    /// The owner cancelled the sequence; no further attempts were made
    Cancelled,
}

impl<T> RetryOutcome<T> {
    /// The success value, if any
    pub fn succeeded(self) -> Option<T> {
        match self {
            RetryOutcome::Succeeded(value) => Some(value),
            RetryOutcome::Cancelled => None,
        }
    }
}

/// State of one retry cycle, handed to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Attempt number (1-based); the first call of the operation is attempt 1
    pub attempt: u32,
    /// Ticks left before the next attempt
    pub remaining_secs: u32,
}

/// Receives progress of a [`CountdownRetrier`] run
///
/// All methods default to no-ops. They are called on the task driving the
/// retrier, in order: `on_failure`, then one `on_tick` per countdown tick, then
/// `on_attempt_start` before the next call.
pub trait RetryObserver<E> {
    /// An attempt failed; `state.remaining_secs` is the full countdown length
    fn on_failure(&mut self, _state: &RetryState, _error: &E) {}

    /// A countdown tick; `state.remaining_secs` runs from the interval down to 1
    fn on_tick(&mut self, _state: &RetryState) {}

    /// The countdown completed and attempt `state.attempt` is about to run
    fn on_attempt_start(&mut self, _state: &RetryState) {}
}

/// Retries an operation indefinitely with a visible countdown between attempts
#[derive(Debug, Clone, Copy)]
pub struct CountdownRetrier {
    interval_secs: u32,
    tick: Duration,
}

impl CountdownRetrier {
    /// Create a retrier counting `interval_secs` ticks of length `tick`
    pub fn new(interval_secs: u32, tick: Duration) -> Self {
        Self {
            interval_secs,
            tick,
        }
    }

    /// Create a retrier for address resolution from the retry configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.analysis_interval_secs, config.tick)
    }

    /// Countdown length in ticks
    pub fn interval_secs(&self) -> u32 {
        self.interval_secs
    }

    /// Run `operation` until it succeeds or `cancel` fires
    ///
    /// Cancellation is checked while the operation runs, before every tick and
    /// during every tick's sleep, so it takes effect within one tick.
    pub async fn run<F, Fut, T, E, O>(
        &self,
        cancel: &CancellationToken,
        observer: &mut O,
        mut operation: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
        O: RetryObserver<E> + ?Sized,
    {
        let mut attempt = 1;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return RetryOutcome::Cancelled,
                result = operation() => result,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, "Operation succeeded after retry");
                    }
                    return RetryOutcome::Succeeded(value);
                }
                Err(e) => e,
            };

            tracing::warn!(
                error = %error,
                attempt,
                retry_in_ticks = self.interval_secs,
                "Operation failed, counting down to retry"
            );

            let mut state = RetryState {
                attempt,
                remaining_secs: self.interval_secs,
            };
            observer.on_failure(&state, &error);

            for remaining in (1..=self.interval_secs).rev() {
                if cancel.is_cancelled() {
                    return RetryOutcome::Cancelled;
                }
                state.remaining_secs = remaining;
                observer.on_tick(&state);

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return RetryOutcome::Cancelled,
                    _ = tokio::time::sleep(self.tick) => {}
                }
            }

            if cancel.is_cancelled() {
                return RetryOutcome::Cancelled;
            }

            attempt += 1;
            let state = RetryState {
                attempt,
                remaining_secs: 0,
            };
            observer.on_attempt_start(&state);
        }
    }
}

/// Execute an async operation with bounded exponential backoff
///
/// Retryable errors (see [`IsRetryable`]) are retried up to
/// `config.max_attempts` times; the last error is returned once attempts run
/// out. Non-retryable errors return immediately. If `cancel` fires while the
/// operation runs or while waiting, [`Error::Cancelled`] is returned.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &BackoffConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = operation() => result,
        };

        match result {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(jittered_delay) => {}
                }

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_cancelled() {
                    return Err(e);
                }
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
