// emvco-hal-rs/emvco-hal/src/transport/mock.rs

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::constants::{MT_COMMAND, MT_RESPONSE, MT_SHIFT, PBF_MASK};
use crate::transport::traits::Link;
use crate::types::PowerState;
use crate::utils::{deadline_after, lock, remaining};
use crate::{Error, Result};

/// Produces the frames the simulated controller answers a write with.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    open_count: usize,
    fail_open: bool,
    inbound: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    fail_writes: usize,
    fail_reads: usize,
    power: Vec<PowerState>,
    indicator: Vec<bool>,
    unanswered: usize,
    max_unanswered: usize,
}

/// Mock link for tests. It records written frames and serves queued
/// inbound bytes; an optional responder scripts the controller side.
#[derive(Default)]
pub struct MockLink {
    state: Mutex<MockState>,
    readable: Condvar,
    wrote: Condvar,
    responder: Mutex<Option<Responder>>,
}

fn message_type(frame: &[u8]) -> Option<u8> {
    frame.first().map(|b| b >> MT_SHIFT)
}

fn is_last_segment(frame: &[u8]) -> bool {
    frame.first().is_some_and(|b| b & PBF_MASK == 0)
}

impl MockLink {
    /// Closed link with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link whose writes are answered by `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    {
        let m = Self::new();
        m.set_responder(responder);
        m
    }

    /// Replace the responder; its frames are queued for reading.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    {
        *lock(&self.responder) = Some(Box::new(responder));
    }

    /// Queue an inbound frame as if the controller had sent it.
    pub fn push_frame(&self, frame: &[u8]) {
        let mut st = lock(&self.state);
        if message_type(frame) == Some(MT_RESPONSE) {
            st.unanswered = st.unanswered.saturating_sub(1);
        }
        st.inbound.extend(frame.iter().copied());
        self.readable.notify_all();
    }

    /// Make the next `n` writes fail.
    pub fn fail_next_writes(&self, n: usize) {
        lock(&self.state).fail_writes = n;
    }

    /// Make the next `n` reads fail.
    pub fn fail_next_reads(&self, n: usize) {
        lock(&self.state).fail_reads = n;
    }

    /// Make `open` fail while set.
    pub fn fail_open(&self, fail: bool) {
        lock(&self.state).fail_open = fail;
    }

    /// Every frame written so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.state).written.clone()
    }

    /// Written frames whose first two header bytes equal `prefix`.
    pub fn written_matching(&self, prefix: [u8; 2]) -> usize {
        lock(&self.state)
            .written
            .iter()
            .filter(|f| f.len() >= 2 && f[..2] == prefix)
            .count()
    }

    /// Forget recorded writes.
    pub fn clear_written(&self) {
        lock(&self.state).written.clear();
    }

    /// Block until at least `count` frames were written.
    pub fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        let deadline = deadline_after(timeout);
        let mut st = lock(&self.state);
        while st.written.len() < count {
            let Some(left) = remaining(deadline) else {
                return false;
            };
            st = match self.wrote.wait_timeout(st, left) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    /// Power states requested, in order.
    pub fn power_log(&self) -> Vec<PowerState> {
        lock(&self.state).power.clone()
    }

    /// Indicator changes, in order.
    pub fn indicator_log(&self) -> Vec<bool> {
        lock(&self.state).indicator.clone()
    }

    /// True between `open` and `close`.
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Successful opens.
    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }

    /// Largest number of commands that were on the link without a
    /// response at the same time.
    pub fn max_unanswered(&self) -> usize {
        lock(&self.state).max_unanswered
    }
}

impl Link for MockLink {
    fn open(&self) -> Result<()> {
        let mut st = lock(&self.state);
        if st.fail_open {
            return Err(Error::Link("mock open failure".into()));
        }
        st.open = true;
        st.open_count += 1;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut st = lock(&self.state);
        st.open = false;
        st.inbound.clear();
        self.readable.notify_all();
        Ok(())
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = deadline_after(timeout);
        let mut st = lock(&self.state);
        if st.fail_reads > 0 {
            st.fail_reads -= 1;
            return Err(Error::Link("mock read failure".into()));
        }
        while st.inbound.is_empty() {
            if !st.open {
                return Err(Error::Link("link closed".into()));
            }
            let Some(left) = remaining(deadline) else {
                return Ok(0);
            };
            st = match self.readable.wait_timeout(st, left) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        let n = buf.len().min(st.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(st.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        {
            let mut st = lock(&self.state);
            if st.fail_writes > 0 {
                st.fail_writes -= 1;
                return Err(Error::Link("mock write failure".into()));
            }
            if message_type(data) == Some(MT_COMMAND) && is_last_segment(data) {
                st.unanswered += 1;
                st.max_unanswered = st.max_unanswered.max(st.unanswered);
            }
            st.written.push(data.to_vec());
            self.wrote.notify_all();
        }

        let replies = match lock(&self.responder).as_mut() {
            Some(respond) => respond(data),
            None => Vec::new(),
        };
        for frame in replies {
            self.push_frame(&frame);
        }
        Ok(data.len())
    }

    fn set_power(&self, state: PowerState) -> Result<()> {
        lock(&self.state).power.push(state);
        Ok(())
    }

    fn set_indicator(&self, on: bool) -> Result<()> {
        lock(&self.state).indicator.push(on);
        Ok(())
    }
}
