//! Retry policy and the status → action decision table.
//!
//! [`classify`] is pure so the whole table can be tested without a network;
//! the executor only feeds it attempt summaries and obeys the [`Decision`].

use memochat_config::{RetryConfig, RetryStrategy};
use std::time::Duration;

/// Default number of attempts per request, first try included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for exponential delays.
const MAX_EXPONENTIAL_DELAY: Duration = Duration::from_secs(30);

/// How long to wait before the `n`th retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed(Duration),
    /// `step * n` before retry `n`.
    Linear(Duration),
    /// `base * 2^(n-1)` before retry `n`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        match *self {
            Self::Fixed(d) => d,
            Self::Linear(step) => step.saturating_mul(retry),
            Self::Exponential { base, max } => {
                let shift = (retry - 1).min(16);
                base.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed(DEFAULT_DELAY)
    }
}

/// Bounded retry budget plus the delay strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Never below 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::ZERO),
        }
    }

    /// Fixed delay with the given attempt ceiling.
    #[must_use]
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Retries left after the first attempt.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.max_attempts.max(1) - 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_ATTEMPTS, DEFAULT_DELAY)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        let delay = Duration::from_millis(cfg.delay_ms);
        let backoff = match cfg.strategy {
            RetryStrategy::Fixed => Backoff::Fixed(delay),
            RetryStrategy::Linear => Backoff::Linear(delay),
            RetryStrategy::Exponential => Backoff::Exponential {
                base: delay,
                max: MAX_EXPONENTIAL_DELAY,
            },
        };
        Self {
            max_attempts: cfg.max_attempts.max(1),
            backoff,
        }
    }
}

/// Summary of a single attempt, as far as the retry decision cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The server answered with this status.
    Status(u16),
    /// No response was obtained (connect, timeout, reset mid-body).
    Network,
}

/// What the executor does after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 2xx: decode and return the payload.
    Succeed,
    /// Clear the credential, redirect, fail with `AuthExpired`.
    ExpireSession,
    /// Wait the backoff delay and try again with one retry fewer.
    Retry,
    /// Terminal failure.
    Fail,
}

/// The decision table.
///
/// 401 wins over everything, regardless of the remaining budget. Server
/// errors (>= 500) and network failures retry while `retries_remaining > 0`.
/// Everything else is final.
#[must_use]
pub fn classify(attempt: Attempt, retries_remaining: u32) -> Decision {
    match attempt {
        Attempt::Status(401) => Decision::ExpireSession,
        Attempt::Status(s) if (200..300).contains(&s) => Decision::Succeed,
        Attempt::Status(s) if s >= 500 && retries_remaining > 0 => Decision::Retry,
        Attempt::Network if retries_remaining > 0 => Decision::Retry,
        Attempt::Status(_) | Attempt::Network => Decision::Fail,
    }
}
