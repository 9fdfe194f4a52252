//! Timeout helpers used across the crate.
//!
//! Configuration carries plain milliseconds; these helpers turn them into
//! `Duration`s and compute the remaining part of a bounded wait.

use std::time::{Duration, Instant};

/// Write-window acquisition bound observed on shipping controllers.
pub const DEFAULT_WINDOW_TIMEOUT_MS: u64 = 2000;

/// Convert milliseconds to Duration.
pub fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Time left until `deadline`, or `None` once it has passed.
pub fn remaining(deadline: Instant) -> Option<Duration> {
    let now = Instant::now();
    if now >= deadline {
        None
    } else {
        Some(deadline - now)
    }
}

/// Deadline `timeout` from now.
pub fn deadline_after(timeout: Duration) -> Instant {
    Instant::now() + timeout
}
