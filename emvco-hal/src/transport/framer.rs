// emvco-hal-rs/emvco-hal/src/transport/framer.rs

//! Transport framer: owns the link, keeps one read pending at all times
//! and serializes physical writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{Level, error, info, log, warn};

use crate::config::HalConfig;
use crate::constants::{GID_CORE, HEADER_LEN, OID_CORE_RESET, RESET_TRIGGER_UNRECOVERABLE};
use crate::protocol::{Header, Packet};
use crate::transport::traits::Link;
use crate::utils::{Backoff, Retry, frame_dump, lock, ms};
use crate::{Error, Result};

/// Receives every complete inbound frame, in arrival order.
pub type FrameSink = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Framer tuning, derived from [`HalConfig`].
#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Largest payload written in one frame.
    pub mtu: usize,
    /// Write attempts before the controller is power-cycled.
    pub write_retries: u32,
    /// Pause between write attempts.
    pub write_retry_delay: Duration,
    /// Timeout of a single link read.
    pub read_poll: Duration,
    /// Delay after failed reads, growing with consecutive failures.
    pub read_backoff: Backoff,
    /// Off time of the recovery power cycle.
    pub power_cycle_delay: Duration,
    /// Log level of the `tx`/`rx` frame dumps.
    pub dump_level: Level,
}

impl From<&HalConfig> for FramerConfig {
    fn from(cfg: &HalConfig) -> Self {
        Self {
            mtu: cfg.max_payload,
            write_retries: cfg.write_retries,
            write_retry_delay: ms(cfg.write_retry_delay_ms),
            read_poll: ms(cfg.read_poll_ms),
            read_backoff: Backoff::Linear {
                step: ms(cfg.read_backoff_step_ms),
                max: ms(cfg.read_backoff_max_ms),
            },
            power_cycle_delay: cfg.power_cycle_delay(),
            dump_level: if cfg.debug_enabled {
                Level::Debug
            } else {
                Level::Trace
            },
        }
    }
}

/// Owns the link: one reader thread, serialized writes.
pub struct Framer {
    link: Arc<dyn Link>,
    cfg: FramerConfig,
    running: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    sink: Mutex<Option<FrameSink>>,
}

impl Framer {
    /// Framer over `link`; nothing runs until [`Framer::start`].
    pub fn new(link: Arc<dyn Link>, cfg: FramerConfig) -> Self {
        Self {
            link,
            cfg,
            running: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
            sink: Mutex::new(None),
        }
    }

    /// The underlying link.
    pub fn link(&self) -> &Arc<dyn Link> {
        &self.link
    }

    /// Maximum payload per written frame.
    pub fn mtu(&self) -> usize {
        self.cfg.mtu
    }

    /// True between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Open the link and spawn the read loop. Frames go to `sink`.
    pub fn start(&self, sink: FrameSink) -> Result<()> {
        let mut reader = lock(&self.reader);
        if reader.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        self.link.open()?;
        self.running.store(true, Ordering::SeqCst);
        *lock(&self.sink) = Some(sink.clone());

        let link = Arc::clone(&self.link);
        let running = Arc::clone(&self.running);
        let cfg = self.cfg.clone();
        let spawned = thread::Builder::new()
            .name("emvco-reader".into())
            .spawn(move || read_loop(link, running, sink, cfg));
        match spawned {
            Ok(handle) => {
                *reader = Some(handle);
                info!("transport started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                lock(&self.sink).take();
                let _ = self.link.close();
                Err(Error::Io(e))
            }
        }
    }

    /// Stop the read loop and close the link. Idempotent.
    pub fn stop(&self) -> Result<()> {
        let handle = lock(&self.reader).take();
        let Some(handle) = handle else {
            return Ok(());
        };
        self.running.store(false, Ordering::SeqCst);
        if handle.join().is_err() {
            error!("read loop panicked");
        }
        lock(&self.sink).take();
        self.link.close()?;
        info!("transport stopped");
        Ok(())
    }

    /// Write one frame, retrying transient failures. When the retries run
    /// out the controller is power-cycled and a reset notification is
    /// synthesized upstream so recovery can start.
    pub fn submit_write(&self, frame: &[u8]) -> Result<usize> {
        if !self.is_running() {
            return Err(Error::NotInitialized);
        }
        if frame.len() < HEADER_LEN || frame.len() > HEADER_LEN + self.cfg.mtu {
            return Err(Error::InvalidLength {
                expected: HEADER_LEN + self.cfg.mtu,
                actual: frame.len(),
            });
        }
        log!(self.cfg.dump_level, "tx {}", frame_dump(frame));

        let retry = Retry::new(self.cfg.write_retries)
            .with_backoff(Backoff::Fixed(self.cfg.write_retry_delay));
        retry
            .run(
                |_| self.link.write(frame),
                |attempt, e| warn!("write attempt {} failed: {}", attempt, e),
            )
            .map_err(|e| {
                error!(
                    "write failed after {} attempts: {}; resetting controller",
                    retry.attempts(),
                    e
                );
                self.recover();
                Error::Link(format!("write failed: {}", e))
            })
    }

    fn recover(&self) {
        if let Err(e) = self.link.power_cycle(self.cfg.power_cycle_delay) {
            error!("power cycle failed: {}", e);
        }
        let sink = lock(&self.sink).clone();
        if let Some(sink) = sink {
            match synthesized_reset_notification() {
                Ok(frame) => sink(frame),
                Err(e) => error!("cannot build reset notification: {}", e),
            }
        }
    }
}

impl Drop for Framer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// CORE_RESET_NTF posted when the link stopped accepting writes.
pub fn synthesized_reset_notification() -> Result<Vec<u8>> {
    Packet::notification(GID_CORE, OID_CORE_RESET, vec![RESET_TRIGGER_UNRECOVERABLE, 0x00])
        .to_frame()
}

fn read_loop(link: Arc<dyn Link>, running: Arc<AtomicBool>, sink: FrameSink, cfg: FramerConfig) {
    let mut reader = FrameReader::new();
    let mut failures = 0u32;
    while running.load(Ordering::SeqCst) {
        match reader.next(&*link, &running, cfg.read_poll) {
            Ok(Some(frame)) => {
                failures = 0;
                log!(cfg.dump_level, "rx {}", frame_dump(&frame));
                sink(frame);
            }
            Ok(None) => {}
            Err(e) => {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                failures = failures.saturating_add(1);
                let delay = cfg.read_backoff.delay(failures);
                warn!("read failed ({}), retrying in {:?}", e, delay);
                thread::sleep(delay);
            }
        }
    }
}

/// Incremental frame assembly over the byte stream.
///
/// The length byte alone decides where a frame ends, so a frame with a bad
/// header is consumed whole before it is dropped. A read that fails or
/// times out halfway leaves the partial frame in place for the next call.
struct FrameReader {
    buf: Vec<u8>,
    filled: usize,
}

impl FrameReader {
    fn new() -> Self {
        Self {
            buf: vec![0u8; HEADER_LEN],
            filled: 0,
        }
    }

    fn wanted(&self) -> usize {
        if self.filled < HEADER_LEN {
            HEADER_LEN
        } else {
            HEADER_LEN + self.buf[2] as usize
        }
    }

    /// `Ok(None)` when the poll interval passed without completing a frame,
    /// or a complete frame was dropped.
    fn next(&mut self, link: &dyn Link, running: &AtomicBool, poll: Duration) -> Result<Option<Vec<u8>>> {
        loop {
            let wanted = self.wanted();
            if self.filled == wanted {
                let frame = std::mem::replace(&mut self.buf, vec![0u8; HEADER_LEN]);
                self.filled = 0;
                return match Header::parse(&frame) {
                    Ok(_) => Ok(Some(frame)),
                    Err(e) => {
                        warn!("dropping frame {}: {}", frame_dump(&frame), e);
                        Ok(None)
                    }
                };
            }
            if !running.load(Ordering::SeqCst) {
                return Ok(None);
            }
            self.buf.resize(wanted, 0);
            let n = link.read(&mut self.buf[self.filled..wanted], poll)?;
            if n == 0 {
                return Ok(None);
            }
            self.filled += n;
        }
    }
}
