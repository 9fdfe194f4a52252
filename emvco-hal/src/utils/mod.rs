//! Utilities for emvco-hal: small, reusable helpers used across the crate.
//!
//! Hex rendering for packet logs, millisecond/deadline helpers for the
//! bounded waits, and the bounded retry combinator.

pub mod hex;
pub mod retry;
pub mod timeout;

pub use hex::*;
pub use retry::{Backoff, Retry, RetryStep};
pub use timeout::*;

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
