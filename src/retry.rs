//! Retry runner for polling an eventually consistent API.
//!
//! The monitoring API does not reflect writes immediately: a deleted rule can
//! still be listed for a few seconds. [`RetryRunner`] repeatedly invokes a
//! caller-supplied probe until it reports [`ProbeResult::Success`], the probe
//! fails with a non-retryable error, or the attempt budget runs out.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use datadog_provider::retry::{Outcome, ProbeResult, RetryRunner};
//!
//! let runner = RetryRunner::fixed(3, Duration::ZERO);
//! let mut remaining = 1;
//! let outcome = runner
//!     .run_blocking(|| -> Result<ProbeResult, std::io::Error> {
//!         if remaining == 0 {
//!             return Ok(ProbeResult::Success);
//!         }
//!         remaining -= 1;
//!         Ok(ProbeResult::retryable("rule still exists"))
//!     })
//!     .unwrap();
//! assert_eq!(outcome, Outcome::Success);
//! ```
//!
//! # Contract
//!
//! - The probe runs at most `max_attempts` times.
//! - The delay is awaited only between two probe invocations, never after a
//!   success and never after the final attempt.
//! - An `Err` from the probe aborts the loop immediately and is returned as-is.
//!   Only [`ProbeResult::Retryable`] is retried.
//! - A budget of zero is a no-op that reports [`Outcome::Success`] without
//!   invoking the probe.
//! - An attached [`CancellationToken`] is checked before each probe and before
//!   each sleep; the async runner also wakes up early from a sleep.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backoff::Backoff;

/// What a single probe invocation observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The awaited condition holds.
    Success,
    /// The condition does not hold yet; the reason is kept for diagnostics.
    Retryable(String),
}

impl ProbeResult {
    /// Shorthand for [`ProbeResult::Retryable`].
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::Retryable(reason.into())
    }

    /// Whether the probe reported success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Terminal state of a retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The probe reported success.
    Success,
    /// The attempt budget was consumed; carries the last failure reason.
    ExhaustedRetries(String),
    /// The attached cancellation token fired.
    Cancelled,
}

impl Outcome {
    /// Whether the loop ended in success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Convert into a `Result` for callers that want to propagate with `?`.
    pub fn into_result(self) -> Result<(), RetryError> {
        match self {
            Self::Success => Ok(()),
            Self::ExhaustedRetries(reason) => Err(RetryError::Exhausted(reason)),
            Self::Cancelled => Err(RetryError::Cancelled),
        }
    }
}

/// Failure form of a non-successful [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    /// Retries ran out. Displays as the last failure reason.
    #[error("{0}")]
    Exhausted(String),

    /// The loop was cancelled before it finished.
    #[error("retry loop cancelled")]
    Cancelled,
}

/// Blocking sleep used by [`RetryRunner::run_blocking_with`].
pub trait Sleeper {
    /// Block for `delay`.
    fn sleep(&mut self, delay: Duration);
}

impl<F: FnMut(Duration)> Sleeper for F {
    fn sleep(&mut self, delay: Duration) {
        self(delay)
    }
}

/// Polls a probe until it succeeds or the attempt budget is exhausted.
#[derive(Debug, Clone)]
pub struct RetryRunner {
    max_attempts: u32,
    backoff: Backoff,
    cancel: Option<CancellationToken>,
}

impl RetryRunner {
    /// Create a runner with the given budget and delay policy.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
            cancel: None,
        }
    }

    /// Create a runner that waits `delay` between every attempt.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Backoff::fixed(delay))
    }

    /// Stop the loop once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The maximum number of probe invocations.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The delay policy.
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Run `probe` on the current thread, sleeping with [`std::thread::sleep`].
    pub fn run_blocking<F, E>(&self, probe: F) -> Result<Outcome, E>
    where
        F: FnMut() -> Result<ProbeResult, E>,
    {
        self.run_blocking_with(std::thread::sleep, probe)
    }

    /// Run `probe` on the current thread, sleeping through `sleeper`.
    pub fn run_blocking_with<S, F, E>(&self, mut sleeper: S, mut probe: F) -> Result<Outcome, E>
    where
        S: Sleeper,
        F: FnMut() -> Result<ProbeResult, E>,
    {
        if self.max_attempts == 0 {
            warn!("retry budget is zero, skipping probe");
            return Ok(Outcome::Success);
        }

        let mut attempts = Attempts::new(self);
        loop {
            if let Some(outcome) = attempts.begin() {
                return Ok(outcome);
            }
            match attempts.record(probe()?) {
                Step::Done(outcome) => return Ok(outcome),
                Step::Wait(delay) => sleeper.sleep(delay),
            }
        }
    }

    /// Run an async `probe`, sleeping with [`tokio::time::sleep`].
    pub async fn run<F, Fut, E>(&self, mut probe: F) -> Result<Outcome, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ProbeResult, E>>,
    {
        if self.max_attempts == 0 {
            warn!("retry budget is zero, skipping probe");
            return Ok(Outcome::Success);
        }

        let mut attempts = Attempts::new(self);
        loop {
            if let Some(outcome) = attempts.begin() {
                return Ok(outcome);
            }
            match attempts.record(probe().await?) {
                Step::Done(outcome) => return Ok(outcome),
                Step::Wait(delay) => match &self.cancel {
                    Some(token) => {
                        tokio::select! {
                            _ = token.cancelled() => {
                                debug!(attempt = attempts.attempt, "cancelled while waiting");
                                return Ok(Outcome::Cancelled);
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => tokio::time::sleep(delay).await,
                },
            }
        }
    }
}

/// Next move of the loop after a probe result.
enum Step {
    Done(Outcome),
    Wait(Duration),
}

/// Per-invocation loop state: the attempt counter is the only thing tracked.
struct Attempts<'a> {
    runner: &'a RetryRunner,
    attempt: u32,
}

impl<'a> Attempts<'a> {
    fn new(runner: &'a RetryRunner) -> Self {
        Self { runner, attempt: 0 }
    }

    /// Enter the next attempt, or stop if cancellation was requested.
    fn begin(&mut self) -> Option<Outcome> {
        if self.runner.is_cancelled() {
            debug!(attempt = self.attempt, "cancelled before probe");
            return Some(Outcome::Cancelled);
        }
        self.attempt += 1;
        None
    }

    fn record(&mut self, result: ProbeResult) -> Step {
        let reason = match result {
            ProbeResult::Success => {
                debug!(attempt = self.attempt, "probe succeeded");
                return Step::Done(Outcome::Success);
            }
            ProbeResult::Retryable(reason) => reason,
        };

        if self.attempt >= self.runner.max_attempts {
            warn!(attempts = self.attempt, reason = %reason, "retries exhausted");
            return Step::Done(Outcome::ExhaustedRetries(reason));
        }
        if self.runner.is_cancelled() {
            debug!(attempt = self.attempt, "cancelled before sleep");
            return Step::Done(Outcome::Cancelled);
        }

        let delay = self.runner.backoff.delay(self.attempt);
        debug!(
            attempt = self.attempt,
            max_attempts = self.runner.max_attempts,
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "probe not satisfied, retrying"
        );
        Step::Wait(delay)
    }
}

/// Serializable retry budget, as found in provider configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum number of probe invocations.
    pub max_attempts: u32,
    /// Fixed wait between attempts, in seconds.
    pub delay_seconds: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay_seconds: 10,
        }
    }
}

impl RetrySettings {
    /// Build a fixed-delay runner from these settings.
    pub fn runner(&self) -> RetryRunner {
        RetryRunner::new(self.max_attempts, Backoff::fixed_seconds(self.delay_seconds))
    }
}
