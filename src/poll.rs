//! Bounded polling shared by the stack and pipeline wait loops.
//!
//! Every loop performs at most `max_attempts` checks with a fixed delay
//! between consecutive checks. The check decides whether to keep waiting or to
//! stop with a value; an error from the check stops the loop immediately.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

/// Delay and attempt budget for a bounded poll loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    delay: Duration,
    max_attempts: u32,
}

/// Errors raised when constructing a [`PollPolicy`].
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum PollPolicyError {
    /// A loop must perform at least one check.
    #[error("max attempts must be greater than zero")]
    ZeroAttempts,
}

impl PollPolicy {
    /// Creates a policy.
    ///
    /// # Errors
    ///
    /// Returns [`PollPolicyError::ZeroAttempts`] when `max_attempts` is zero.
    pub const fn new(delay: Duration, max_attempts: u32) -> Result<Self, PollPolicyError> {
        if max_attempts == 0 {
            return Err(PollPolicyError::ZeroAttempts);
        }
        Ok(Self {
            delay,
            max_attempts,
        })
    }

    /// Creates a policy from a whole-second delay.
    ///
    /// # Errors
    ///
    /// Returns [`PollPolicyError::ZeroAttempts`] when `max_attempts` is zero.
    pub const fn from_secs(delay_secs: u64, max_attempts: u32) -> Result<Self, PollPolicyError> {
        Self::new(Duration::from_secs(delay_secs), max_attempts)
    }

    /// Delay slept between consecutive checks.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Maximum number of checks performed.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Result of a single check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Step<T, P = ()> {
    /// Keep waiting; carries what the check observed.
    Pending(P),
    /// Stop with a terminal value.
    Done(T),
}

/// Terminal state of a poll loop that did not fail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Polled<T, P = ()> {
    /// A check returned [`Step::Done`].
    Done {
        /// Value produced by the check.
        value: T,
        /// Number of checks performed, including the final one.
        attempts: u32,
    },
    /// Every attempt returned [`Step::Pending`].
    Exhausted {
        /// Number of checks performed (always the policy maximum).
        attempts: u32,
        /// Observation from the final check.
        last: Option<P>,
    },
}

/// Runs `check` until it returns [`Step::Done`], fails, or the attempt budget
/// is spent.
///
/// `check` receives the 1-based attempt number. The delay is slept between
/// checks only, never after the final check.
///
/// # Errors
///
/// Returns the first error produced by `check`.
pub async fn poll_until<T, P, E, F, Fut>(policy: PollPolicy, mut check: F) -> Result<Polled<T, P>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Step<T, P>, E>>,
{
    let mut last = None;
    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            sleep(policy.delay).await;
        }
        debug!(attempt, max_attempts = policy.max_attempts, "poll check");
        match check(attempt).await? {
            Step::Done(value) => {
                return Ok(Polled::Done {
                    value,
                    attempts: attempt,
                });
            }
            Step::Pending(observed) => last = Some(observed),
        }
    }

    Ok(Polled::Exhausted {
        attempts: policy.max_attempts,
        last,
    })
}
