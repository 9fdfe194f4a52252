// emvco-hal-rs/emvco-hal/src/sync/watchdog.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, warn};

use super::command::CommandSync;
use crate::Result;
use crate::Status;
use crate::events::{HalEvent, QueueItem, QueuePoster};
use crate::utils::lock;

/// Upper bound on one idle wait of the watchdog thread.
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Enforces response deadlines of raw control-plane writes.
pub struct Watchdog {
    sync: Arc<CommandSync>,
    stop: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    /// Spawn the watchdog thread; timeouts are posted as `CommandTimeout`.
    pub fn start(sync: Arc<CommandSync>, poster: QueuePoster) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let sync = Arc::clone(&sync);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("emvco-watchdog".into())
                .spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        if sync.expire_external(IDLE_WAIT) {
                            warn!("raw command got no response");
                            if poster
                                .post(QueueItem::Event(HalEvent::CommandTimeout, Status::Timeout))
                                .is_err()
                            {
                                break;
                            }
                        }
                    }
                })?
        };
        Ok(Self {
            sync,
            stop,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop and join the thread. Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.sync.wake();
        if let Some(h) = lock(&self.handle).take() {
            if h.join().is_err() {
                error!("watchdog panicked");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
