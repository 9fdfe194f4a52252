// emvco-hal-rs/emvco-hal/src/sync/command.rs

//! One-command-in-flight discipline.
//!
//! Every command and data packet takes the write window before it is
//! written and registers itself as the single pending operation. Inbound
//! packets complete it: the matching response, a credit notification for
//! the pending data connection, or a link-loss notification. Completion
//! releases the window.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, error, warn};

use super::window::WriteWindow;
use crate::config::HalConfig;
use crate::constants::{GID_CORE, GID_RF, OID_CORE_CONN_CREDITS, OID_CORE_RESET, OID_RF_DEACTIVATE};
use crate::fragment::segment;
use crate::protocol::responses::{decode_credits_notification, decode_deactivate_notification};
use crate::protocol::{MessageType, Packet};
use crate::types::ChannelId;
use crate::utils::{deadline_after, lock, remaining};
use crate::{Error, Result};

/// Sink for outbound frames, normally the transport framer.
pub trait FrameWriter: Send + Sync {
    /// Write one frame, returning the bytes written.
    fn write_frame(&self, frame: &[u8]) -> Result<usize>;

    /// Largest payload a frame may carry.
    fn mtu(&self) -> usize;
}

impl FrameWriter for crate::transport::Framer {
    fn write_frame(&self, frame: &[u8]) -> Result<usize> {
        self.submit_write(frame)
    }

    fn mtu(&self) -> usize {
        crate::transport::Framer::mtu(self)
    }
}

/// Timeouts of the command synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Longest wait for the write window before `Busy`.
    pub window_timeout: Duration,
    /// Wait for a response before retransmitting.
    pub response_timeout: Duration,
    /// Retransmissions after the first attempt.
    pub retransmits: u8,
}

impl From<&HalConfig> for SyncConfig {
    fn from(cfg: &HalConfig) -> Self {
        Self {
            window_timeout: cfg.window_timeout(),
            response_timeout: cfg.response_timeout(),
            retransmits: cfg.command_retransmits,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    Response { gid: u8, oid: u8 },
    Credit { conn: u8 },
}

/// Who submitted the pending command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A caller thread blocks for the outcome.
    Internal,
    /// Raw write from the control plane; the watchdog enforces the deadline.
    External,
}

#[derive(Debug)]
struct Pending {
    token: u64,
    awaiting: Awaiting,
    origin: Origin,
    deadline: Instant,
}

#[derive(Debug)]
enum Outcome {
    Response(Packet),
    Credited,
    LinkLost,
    Aborted,
}

#[derive(Debug, Default)]
struct SyncState {
    next_token: u64,
    pending: Option<Pending>,
    done: HashMap<u64, Outcome>,
    resetting: bool,
}

/// Pairs each command with its response through the single write window.
pub struct CommandSync {
    cfg: SyncConfig,
    window: WriteWindow,
    state: Mutex<SyncState>,
    cv: Condvar,
}

impl CommandSync {
    /// Idle synchronizer with a free window.
    pub fn new(cfg: SyncConfig) -> Self {
        Self {
            cfg,
            window: WriteWindow::new(),
            state: Mutex::new(SyncState::default()),
            cv: Condvar::new(),
        }
    }

    /// Active timeouts.
    pub fn config(&self) -> &SyncConfig {
        &self.cfg
    }

    /// True while a command or data packet awaits release.
    pub fn has_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    /// While set, CORE_RESET_NTF is part of a handshake, not a link loss.
    pub fn set_resetting(&self, on: bool) {
        lock(&self.state).resetting = on;
    }

    /// Handshake in progress.
    pub fn is_resetting(&self) -> bool {
        lock(&self.state).resetting
    }

    /// Send a command and wait for its response, retransmitting up to
    /// `retransmits` times on timeout.
    pub fn send_command(
        &self,
        writer: &dyn FrameWriter,
        packet: &Packet,
        retransmits: u8,
    ) -> Result<Packet> {
        if !packet.is_command() {
            return Err(Error::InvalidParameter(format!("not a command: {}", packet)));
        }
        let frames = segment(packet, writer.mtu())?;
        self.window.acquire(self.cfg.window_timeout)?;
        let token = self.register(
            Awaiting::Response {
                gid: packet.gid,
                oid: packet.oid,
            },
            Origin::Internal,
        );

        for attempt in 0..=retransmits {
            if attempt > 0 {
                warn!("no response to {}, retransmit {}/{}", packet, attempt, retransmits);
                self.renew(token);
            }
            if let Err(e) = write_all(writer, &frames) {
                self.cancel(token);
                return Err(e);
            }
            match self.wait(token) {
                Some(Outcome::Response(rsp)) => return Ok(rsp),
                Some(Outcome::LinkLost) => {
                    return Err(Error::Link(format!("link lost awaiting {}", packet)));
                }
                Some(Outcome::Aborted) => return Err(Error::state("command aborted")),
                Some(Outcome::Credited) => {
                    return Err(Error::state("credit completed a command"));
                }
                None => {}
            }
        }

        match self.finish_timed_out(token) {
            Some(Outcome::Response(rsp)) => Ok(rsp),
            _ => {
                error!("{} timed out after {} retransmits", packet, retransmits);
                Err(Error::Timeout)
            }
        }
    }

    /// Send one data frame on `conn`. With `await_credit` the window stays
    /// held until the controller grants a credit for the connection.
    pub fn send_data_frame(
        &self,
        writer: &dyn FrameWriter,
        conn: ChannelId,
        frame: &[u8],
        await_credit: bool,
    ) -> Result<()> {
        self.window.acquire(self.cfg.window_timeout)?;
        if !await_credit {
            let res = writer.write_frame(frame).map(|_| ());
            self.window.release();
            return res;
        }

        let token = self.register(
            Awaiting::Credit {
                conn: conn.as_u8(),
            },
            Origin::Internal,
        );
        if let Err(e) = writer.write_frame(frame) {
            self.cancel(token);
            return Err(e);
        }
        match self.wait(token).or_else(|| self.finish_timed_out(token)) {
            Some(Outcome::Credited) => Ok(()),
            Some(Outcome::LinkLost) => Err(Error::Link("link lost awaiting credit".into())),
            Some(Outcome::Aborted) => Err(Error::state("data transfer aborted")),
            Some(Outcome::Response(_)) => Err(Error::state("response completed a data packet")),
            None => {
                error!("no credit for conn {} within {:?}", conn, self.cfg.response_timeout);
                Err(Error::Timeout)
            }
        }
    }

    /// Write a packet on behalf of the control plane without waiting.
    /// Commands and data still take the window; the watchdog releases it
    /// if nothing answers in time.
    pub fn submit_external(&self, writer: &dyn FrameWriter, packet: &Packet) -> Result<()> {
        let frames = segment(packet, writer.mtu())?;
        let awaiting = match packet.mt {
            MessageType::Command => Awaiting::Response {
                gid: packet.gid,
                oid: packet.oid,
            },
            MessageType::Data => Awaiting::Credit { conn: packet.gid },
            _ => return write_all(writer, &frames),
        };
        self.window.acquire(self.cfg.window_timeout)?;
        let token = self.register(awaiting, Origin::External);
        if let Err(e) = write_all(writer, &frames) {
            self.cancel(token);
            return Err(e);
        }
        Ok(())
    }

    /// Route an inbound packet. Returns `true` when it answered an
    /// internal command and must not be forwarded.
    pub fn on_packet(&self, packet: &Packet) -> bool {
        let mut st = lock(&self.state);
        let Some(pending) = st.pending.as_ref() else {
            return false;
        };

        let (outcome, consumed) = match (packet.mt, pending.awaiting) {
            (MessageType::Response, Awaiting::Response { gid, oid })
                if packet.gid == gid && packet.oid == oid =>
            {
                (
                    Outcome::Response(packet.clone()),
                    pending.origin == Origin::Internal,
                )
            }
            (MessageType::Notification, Awaiting::Credit { conn })
                if packet.gid == GID_CORE && packet.oid == OID_CORE_CONN_CREDITS =>
            {
                match decode_credits_notification(&packet.payload) {
                    Ok(n) if n.credits_for(ChannelId::new(conn)) > 0 => (Outcome::Credited, false),
                    _ => return false,
                }
            }
            (MessageType::Notification, _) if is_link_loss(packet, st.resetting) => {
                warn!("link loss ({}) while a command is pending", packet);
                (Outcome::LinkLost, false)
            }
            _ => return false,
        };

        if let Some(p) = st.pending.take() {
            if p.origin == Origin::Internal {
                st.done.insert(p.token, outcome);
            }
        }
        self.window.release();
        self.cv.notify_all();
        consumed
    }

    /// Fail whatever is pending and free the window.
    pub fn abort(&self) {
        let mut st = lock(&self.state);
        if let Some(p) = st.pending.take() {
            debug!("aborting pending {:?}", p.awaiting);
            if p.origin == Origin::Internal {
                st.done.insert(p.token, Outcome::Aborted);
            }
            self.window.release();
        }
        self.cv.notify_all();
    }

    /// Wake anything blocked on the state condvar.
    pub fn wake(&self) {
        self.cv.notify_all();
    }

    /// Watchdog step: wait up to `max_wait` for an external pending
    /// operation to pass its deadline. Returns `true` when one expired; the
    /// window has then been released.
    pub fn expire_external(&self, max_wait: Duration) -> bool {
        let mut st = lock(&self.state);
        let deadline = st
            .pending
            .as_ref()
            .filter(|p| p.origin == Origin::External)
            .map(|p| p.deadline);
        let wait = match deadline.map(remaining) {
            Some(None) => {
                let expired = st.pending.take().map(|p| p.awaiting);
                warn!("external command timed out: {:?}", expired);
                self.window.release();
                self.cv.notify_all();
                return true;
            }
            Some(Some(left)) => left.min(max_wait),
            None => max_wait,
        };
        let _guard = match self.cv.wait_timeout(st, wait) {
            Ok((g, _)) => g,
            Err(poisoned) => poisoned.into_inner().0,
        };
        false
    }

    fn register(&self, awaiting: Awaiting, origin: Origin) -> u64 {
        let mut st = lock(&self.state);
        st.next_token += 1;
        let token = st.next_token;
        st.pending = Some(Pending {
            token,
            awaiting,
            origin,
            deadline: deadline_after(self.cfg.response_timeout),
        });
        self.cv.notify_all();
        token
    }

    fn renew(&self, token: u64) {
        let mut st = lock(&self.state);
        if let Some(p) = st.pending.as_mut().filter(|p| p.token == token) {
            p.deadline = deadline_after(self.cfg.response_timeout);
        }
    }

    /// Block until `token` completes or its deadline passes. `None` on
    /// timeout; the operation then stays pending.
    fn wait(&self, token: u64) -> Option<Outcome> {
        let mut st = lock(&self.state);
        loop {
            if let Some(outcome) = st.done.remove(&token) {
                return Some(outcome);
            }
            let deadline = match st.pending.as_ref() {
                Some(p) if p.token == token => p.deadline,
                // completed and collected elsewhere, or aborted without record
                _ => return Some(Outcome::Aborted),
            };
            let left = remaining(deadline)?;
            st = match self.cv.wait_timeout(st, left) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Give up on `token`. A completion that raced the timeout wins.
    fn finish_timed_out(&self, token: u64) -> Option<Outcome> {
        let mut st = lock(&self.state);
        if let Some(outcome) = st.done.remove(&token) {
            return Some(outcome);
        }
        if st.pending.as_ref().is_some_and(|p| p.token == token) {
            st.pending = None;
            self.window.release();
        }
        None
    }

    fn cancel(&self, token: u64) {
        let mut st = lock(&self.state);
        st.done.remove(&token);
        if st.pending.as_ref().is_some_and(|p| p.token == token) {
            st.pending = None;
            self.window.release();
        }
    }
}

fn write_all(writer: &dyn FrameWriter, frames: &[Vec<u8>]) -> Result<()> {
    for f in frames {
        writer.write_frame(f)?;
    }
    Ok(())
}

/// CORE_RESET_NTF outside a handshake, or RF_DEACTIVATE_NTF reporting RF
/// link loss.
pub fn is_link_loss(packet: &Packet, resetting: bool) -> bool {
    if packet.is(MessageType::Notification, GID_CORE, OID_CORE_RESET) {
        return !resetting;
    }
    if packet.is(MessageType::Notification, GID_RF, OID_RF_DEACTIVATE) {
        return decode_deactivate_notification(&packet.payload)
            .map(|n| n.is_link_loss())
            .unwrap_or(false);
    }
    false
}
