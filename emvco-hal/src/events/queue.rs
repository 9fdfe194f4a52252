// emvco-hal-rs/emvco-hal/src/events/queue.rs

//! Deferred-call queue: a FIFO mailbox drained by a single consumer thread.
//!
//! The read loop, the watchdog and caller threads post here instead of
//! calling upward directly, so callbacks never run under the poster's locks
//! and never run concurrently with each other.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use log::{debug, error};

use super::callbacks::HalEvent;
use crate::utils::lock;
use crate::{Error, Result, Status};

/// A deferred call.
pub enum QueueItem {
    /// Complete inbound wire frame.
    Frame(Vec<u8>),
    /// Event to report upstream.
    Event(HalEvent, Status),
    /// Arbitrary deferred work.
    Call(Box<dyn FnOnce() + Send>),
    /// Stops the consumer once reached.
    Shutdown,
}

impl std::fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueItem::Frame(b) => write!(f, "Frame({} bytes)", b.len()),
            QueueItem::Event(e, s) => write!(f, "Event({}, {})", e, s),
            QueueItem::Call(_) => write!(f, "Call"),
            QueueItem::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Cloneable posting handle.
#[derive(Clone)]
pub struct QueuePoster {
    tx: Arc<Mutex<Sender<QueueItem>>>,
}

impl QueuePoster {
    /// Queue `item`; fails once the consumer is gone.
    pub fn post(&self, item: QueueItem) -> Result<()> {
        lock(&self.tx)
            .send(item)
            .map_err(|_| Error::state("event queue stopped"))
    }
}

/// FIFO mailbox with its consumer thread.
pub struct EventQueue {
    poster: QueuePoster,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl EventQueue {
    /// Spawn the consumer thread; `handler` sees every item except
    /// `Shutdown`, in posting order.
    pub fn start<H>(handler: H) -> Result<Self>
    where
        H: FnMut(QueueItem) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("emvco-events".into())
            .spawn(move || consume(rx, handler))?;
        let worker_id = handle.thread().id();
        Ok(Self {
            poster: QueuePoster {
                tx: Arc::new(Mutex::new(tx)),
            },
            worker: Mutex::new(Some(handle)),
            worker_id,
        })
    }

    /// Queue `item`.
    pub fn post(&self, item: QueueItem) -> Result<()> {
        self.poster.post(item)
    }

    /// Handle for other threads.
    pub fn poster(&self) -> QueuePoster {
        self.poster.clone()
    }

    /// Whether the caller runs on the consumer thread.
    pub fn is_consumer_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Drain what is already queued, then stop the consumer. Called from
    /// the consumer itself, the thread is detached instead of joined.
    pub fn stop(&self) {
        let Some(handle) = lock(&self.worker).take() else {
            return;
        };
        let _ = self.post(QueueItem::Shutdown);
        if self.is_consumer_thread() {
            debug!("event queue stopped from its own consumer");
            return;
        }
        if handle.join().is_err() {
            error!("event consumer panicked");
        }
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

fn consume<H: FnMut(QueueItem)>(rx: Receiver<QueueItem>, mut handler: H) {
    while let Ok(item) = rx.recv() {
        if let QueueItem::Shutdown = item {
            break;
        }
        handler(item);
    }
}
