// emvco-hal-rs/emvco-hal/src/sync/window.rs

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::utils::{deadline_after, lock, remaining};
use crate::{Error, Result};

/// Binary write window: held from a command's write until its response
/// (or credit, or link loss) arrives.
#[derive(Debug, Default)]
pub struct WriteWindow {
    held: Mutex<bool>,
    cv: Condvar,
}

impl WriteWindow {
    /// Free window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the window, waiting at most `timeout`.
    pub fn acquire(&self, timeout: Duration) -> Result<()> {
        let deadline = deadline_after(timeout);
        let mut held = lock(&self.held);
        while *held {
            let Some(left) = remaining(deadline) else {
                return Err(Error::Busy(format!(
                    "write window not released within {:?}",
                    timeout
                )));
            };
            held = match self.cv.wait_timeout(held, left) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *held = true;
        Ok(())
    }

    /// Give the window back. Returns whether it was held.
    pub fn release(&self) -> bool {
        let mut held = lock(&self.held);
        let was = *held;
        *held = false;
        self.cv.notify_one();
        was
    }

    /// True while a command owns the window.
    pub fn is_held(&self) -> bool {
        *lock(&self.held)
    }
}
