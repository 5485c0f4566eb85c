//! Retry budget and exponential backoff for the fetches of one tick.

use std::time::Duration;

use crate::source::SourceError;

/// Retry configuration shared by every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fetch attempts allowed per tick, at least 1
    pub max_retries: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Upper bound of any delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the failed attempt `attempt` (0-based):
    /// `min(base_delay * 2^attempt, max_delay)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait for the given delay, then try again.
    Retry(Duration),
    /// The budget of the tick is spent.
    GiveUp,
}

/// Retry state of a single tick. A new one is created for every tick, so the
/// backoff always restarts from `base_delay`.
///
/// # Examples
///
/// ```ignore
/// let mut state = RetryState::new(policy);
/// loop {
///     match source.fetch().await {
///         Ok(snapshot) => break Some(snapshot),
///         Err(e) => match state.record_failure(e) {
///             RetryDecision::Retry(delay) => time::sleep(delay).await,
///             RetryDecision::GiveUp => break None,
///         },
///     }
/// }
/// ```
#[derive(Debug)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
    last_error: Option<SourceError>,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        RetryState {
            policy,
            attempts: 0,
            last_error: None,
        }
    }

    /// Records a failed attempt and decides whether to try again.
    pub fn record_failure(&mut self, error: SourceError) -> RetryDecision {
        let attempt = self.attempts;
        self.attempts += 1;
        self.last_error = Some(error);

        if self.attempts >= self.policy.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.policy.delay(attempt))
        }
    }

    /// Number of failed attempts so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Consumes the state, returning the error of the last attempt.
    pub fn into_last_error(self) -> Option<SourceError> {
        self.last_error
    }
}
