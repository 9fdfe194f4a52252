//! Bounded retry combinator.
//!
//! A [`Retry`] policy walks through `Attempt -> Backoff -> Attempt ... ->
//! GiveUp`; the number of attempts is always finite.

use std::thread;
use std::time::Duration;

/// Delay inserted between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Same pause every time.
    Fixed(Duration),
    /// `step * failures`, capped at `max`.
    Linear {
        /// Increment per failure.
        step: Duration,
        /// Ceiling.
        max: Duration,
    },
}

impl Backoff {
    /// Delay after `failures` consecutive failures (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => d,
            Backoff::Linear { step, max } => step.saturating_mul(failures.max(1)).min(max),
        }
    }
}

/// Next move of a retry policy after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Try again now.
    Attempt,
    /// Sleep, then try again.
    Backoff(Duration),
    /// Attempts exhausted.
    GiveUp,
}

/// Bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    attempts: u32,
    backoff: Backoff,
}

impl Retry {
    /// Policy allowing `attempts` tries in total (at least one).
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff: Backoff::None,
        }
    }

    /// Replace the backoff.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Total attempts, the first one included.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// What to do after `failures` failed attempts.
    pub fn step(&self, failures: u32) -> RetryStep {
        if failures == 0 {
            RetryStep::Attempt
        } else if failures >= self.attempts {
            RetryStep::GiveUp
        } else {
            match self.backoff.delay(failures) {
                d if d.is_zero() => RetryStep::Attempt,
                d => RetryStep::Backoff(d),
            }
        }
    }

    /// Run `op` until it succeeds or the policy gives up. `between` runs
    /// after every failure that will be retried, before the backoff sleep;
    /// it receives the 1-based number of the failed attempt.
    pub fn run<T, E, F, B>(&self, mut op: F, mut between: B) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        B: FnMut(u32, &E),
    {
        let mut failures = 0u32;
        loop {
            match op(failures + 1) {
                Ok(v) => return Ok(v),
                Err(e) => {
                    failures += 1;
                    match self.step(failures) {
                        RetryStep::GiveUp => return Err(e),
                        RetryStep::Attempt => between(failures, &e),
                        RetryStep::Backoff(d) => {
                            between(failures, &e);
                            thread::sleep(d);
                        }
                    }
                }
            }
        }
    }
}
