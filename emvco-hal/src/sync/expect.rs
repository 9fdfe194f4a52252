// emvco-hal-rs/emvco-hal/src/sync/expect.rs

//! Notification expectations.
//!
//! A caller registers interest in a notification or a connection's data
//! before issuing the command that triggers it; matching inbound packets
//! are captured for that caller instead of being forwarded upstream.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::protocol::{MessageType, Packet};
use crate::utils::{deadline_after, lock, remaining};
use crate::{Error, Result};

/// Selects the inbound packets an expectation captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Notification with this opcode.
    Notification {
        /// Group id.
        gid: u8,
        /// Opcode id.
        oid: u8,
    },
    /// Data on this logical connection.
    Data {
        /// Logical connection id.
        conn: u8,
    },
}

impl Filter {
    /// True when `packet` is selected.
    pub fn matches(&self, packet: &Packet) -> bool {
        match *self {
            Filter::Notification { gid, oid } => packet.is(MessageType::Notification, gid, oid),
            Filter::Data { conn } => packet.conn_id() == Some(conn),
        }
    }
}

#[derive(Debug)]
struct Entry {
    id: u64,
    filter: Filter,
    captured: Vec<Packet>,
    failed: bool,
}

#[derive(Debug, Default)]
struct Table {
    next_id: u64,
    entries: Vec<Entry>,
}

/// Registry of open expectations, shared with the router.
#[derive(Debug, Default)]
pub struct Expectations {
    table: Mutex<Table>,
    cv: Condvar,
}

impl Expectations {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in packets matching `filter`.
    pub fn register(self: &Arc<Self>, filter: Filter) -> Expectation {
        let mut t = lock(&self.table);
        t.next_id += 1;
        let id = t.next_id;
        t.entries.push(Entry {
            id,
            filter,
            captured: Vec::new(),
            failed: false,
        });
        Expectation {
            owner: Arc::clone(self),
            id,
        }
    }

    /// Hand `packet` to the oldest matching expectation. Returns whether it
    /// was captured.
    pub fn offer(&self, packet: &Packet) -> bool {
        let mut t = lock(&self.table);
        match t.entries.iter_mut().find(|e| e.filter.matches(packet)) {
            Some(entry) => {
                entry.captured.push(packet.clone());
                self.cv.notify_all();
                true
            }
            None => false,
        }
    }

    /// Fail every registered expectation, e.g. after link loss.
    pub fn fail_all(&self) {
        let mut t = lock(&self.table);
        for e in t.entries.iter_mut() {
            e.failed = true;
        }
        self.cv.notify_all();
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        lock(&self.table).entries.is_empty()
    }

    fn remove(&self, id: u64) {
        lock(&self.table).entries.retain(|e| e.id != id);
    }
}

/// Registered expectation; unregisters on drop.
#[derive(Debug)]
pub struct Expectation {
    owner: Arc<Expectations>,
    id: u64,
}

impl Expectation {
    /// Wait until `count` packets were captured and take them.
    pub fn wait(&self, count: usize, timeout: Duration) -> Result<Vec<Packet>> {
        let deadline = deadline_after(timeout);
        let mut t = lock(&self.owner.table);
        loop {
            let Some(entry) = t.entries.iter_mut().find(|e| e.id == self.id) else {
                return Err(Error::state("expectation no longer registered"));
            };
            if entry.captured.len() >= count {
                return Ok(entry.captured.drain(..count).collect());
            }
            if entry.failed {
                return Err(Error::Link("link lost while waiting".into()));
            }
            let Some(left) = remaining(deadline) else {
                return Err(Error::Timeout);
            };
            t = match self.owner.cv.wait_timeout(t, left) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Wait for the first captured packet.
    pub fn wait_one(&self, timeout: Duration) -> Result<Packet> {
        let mut v = self.wait(1, timeout)?;
        v.pop().ok_or(Error::Timeout)
    }
}

impl Drop for Expectation {
    fn drop(&mut self) {
        self.owner.remove(self.id);
    }
}
