//! Test support helpers intended for use by unit and integration tests.
//!
//! [`SimController`] scripts the controller side of a [`MockLink`] so the
//! whole engine can run end-to-end without hardware; [`RecordingCallbacks`]
//! and [`RecordingSubsystem`] capture what the engine reports upward.
#![allow(dead_code)]

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::constants::*;
use crate::events::{HalCallbacks, HalEvent};
use crate::fragment::{Reassembler, segment};
use crate::profile::NfcSubsystem;
use crate::protocol::{MessageType, Packet};
use crate::transport::MockLink;
use crate::types::NciVersion;
use crate::utils::{deadline_after, lock, remaining};
use crate::{Result, Status};

/// NFCEE_DISCOVER_NTF payload for an enabled slot speaking one protocol.
#[doc(hidden)]
pub fn slot_announcement(id: u8) -> Vec<u8> {
    vec![id, 0x00, 0x01, RF_PROTOCOL_ISO_DEP, 0x01, 0xA0, 0x02, 0x3B, 0x8F, 0x01]
}

/// Behaviour of the simulated controller.
#[doc(hidden)]
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Version announced on reset.
    pub version: NciVersion,
    /// Answer CORE_RESET at all.
    pub answer_reset: bool,
    /// NFCEE_DISCOVER_NTF payloads, one per slot.
    pub slots: Vec<Vec<u8>>,
    /// Max payload granted to new connections.
    pub conn_max_payload: u8,
    /// Initial credits of new connections.
    pub conn_credits: u8,
    /// Data packet sent back for every complete APDU.
    pub card_response: Vec<u8>,
    /// Protocol reported in RF_INTF_ACTIVATED_NTF after discovery starts.
    pub activate_protocol: Option<u8>,
    /// Firmware bytes in CORE_RESET_NTF.
    pub manufacturer_info: Vec<u8>,
    /// Commands (gid, oid) left unanswered.
    pub ignore: Vec<(u8, u8)>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            version: NciVersion::new(NCI_VERSION_2_0),
            answer_reset: true,
            slots: vec![slot_announcement(0x20)],
            conn_max_payload: 0xFD,
            conn_credits: 0x01,
            card_response: vec![0x90, 0x00],
            activate_protocol: None,
            manufacturer_info: vec![0x01, 0x02, 0x03, 0x04],
            ignore: Vec::new(),
        }
    }
}

/// Complete packets the simulated controller received.
#[doc(hidden)]
#[derive(Clone, Default)]
pub struct SimLog(Arc<Mutex<Vec<Packet>>>);

impl SimLog {
    /// Everything received, in order.
    pub fn packets(&self) -> Vec<Packet> {
        lock(&self.0).clone()
    }

    /// Packets with this opcode.
    pub fn count(&self, mt: MessageType, gid: u8, oid: u8) -> usize {
        lock(&self.0).iter().filter(|p| p.is(mt, gid, oid)).count()
    }

    /// Commands with this opcode.
    pub fn commands(&self, gid: u8, oid: u8) -> usize {
        self.count(MessageType::Command, gid, oid)
    }

    /// Payloads of received data packets.
    pub fn data(&self) -> Vec<Vec<u8>> {
        lock(&self.0)
            .iter()
            .filter(|p| p.is_data())
            .map(|p| p.payload.clone())
            .collect()
    }
}

/// Scripted NCI controller answering frames written to a [`MockLink`].
#[doc(hidden)]
pub struct SimController {
    cfg: SimConfig,
    rx: Reassembler,
    next_conn: u8,
    log: SimLog,
}

impl SimController {
    /// Controller with an empty log.
    pub fn new(cfg: SimConfig) -> Self {
        Self {
            cfg,
            rx: Reassembler::new(4096),
            next_conn: 0x01,
            log: SimLog::default(),
        }
    }

    /// Make this controller the responder of `link`.
    pub fn install(self, link: &MockLink) -> SimLog {
        let log = self.log.clone();
        let mut sim = self;
        link.set_responder(move |frame| sim.respond(frame));
        log
    }

    /// Frames sent back for one written frame.
    pub fn respond(&mut self, frame: &[u8]) -> Vec<Vec<u8>> {
        let Ok(done) = self.rx.push(frame) else {
            return Vec::new();
        };
        let mut out = Vec::new();

        // every data segment earns a credit
        let is_data = frame.first().is_some_and(|b| b >> MT_SHIFT == MT_DATA);
        if is_data && self.cfg.conn_credits != CREDITS_FLOW_CONTROL_DISABLED {
            let conn = frame[0] & GID_MASK;
            out.push(Packet::notification(
                GID_CORE,
                OID_CORE_CONN_CREDITS,
                vec![0x01, conn, 0x01],
            ));
        }

        if let Some(packet) = done {
            lock(&self.log.0).push(packet.clone());
            match packet.mt {
                MessageType::Data => {
                    out.push(Packet::data(packet.gid, self.cfg.card_response.clone()));
                }
                MessageType::Command => out.extend(self.on_command(&packet)),
                _ => {}
            }
        }

        out.iter()
            .filter_map(|p| segment(p, MAX_FRAME_PAYLOAD).ok())
            .flatten()
            .collect()
    }

    fn on_command(&mut self, cmd: &Packet) -> Vec<Packet> {
        let ok = |gid, oid| Packet::response(gid, oid, vec![STATUS_OK]);
        let version = self.cfg.version;
        if self.cfg.ignore.contains(&(cmd.gid, cmd.oid)) {
            return Vec::new();
        }
        match (cmd.gid, cmd.oid) {
            (GID_CORE, OID_CORE_RESET) if !self.cfg.answer_reset => Vec::new(),
            (GID_CORE, OID_CORE_RESET) if version.is_v2() => {
                let mut ntf = vec![0x02, 0x00, version.raw(), 0x04];
                ntf.push(self.cfg.manufacturer_info.len() as u8);
                ntf.extend_from_slice(&self.cfg.manufacturer_info);
                vec![
                    ok(GID_CORE, OID_CORE_RESET),
                    Packet::notification(GID_CORE, OID_CORE_RESET, ntf),
                ]
            }
            (GID_CORE, OID_CORE_RESET) => vec![Packet::response(
                GID_CORE,
                OID_CORE_RESET,
                vec![STATUS_OK, version.raw(), 0x01],
            )],
            (GID_CORE, OID_CORE_INIT) => vec![Packet::response(
                GID_CORE,
                OID_CORE_INIT,
                vec![STATUS_OK, 0x1E, 0x03, 0x00, 0x00, 0x04, 0xFF],
            )],
            (GID_CORE, OID_CORE_CONN_CREATE) => {
                let conn = self.next_conn;
                self.next_conn = self.next_conn % 0x0E + 1;
                vec![Packet::response(
                    GID_CORE,
                    OID_CORE_CONN_CREATE,
                    vec![
                        STATUS_OK,
                        self.cfg.conn_max_payload,
                        self.cfg.conn_credits,
                        conn,
                    ],
                )]
            }
            (GID_RF, OID_RF_DISCOVER) => {
                let mut v = vec![ok(GID_RF, OID_RF_DISCOVER)];
                if let Some(protocol) = self.cfg.activate_protocol {
                    v.push(Packet::notification(
                        GID_RF,
                        OID_RF_INTF_ACTIVATED,
                        vec![0x01, 0x02, protocol, NFC_A_PASSIVE_POLL_MODE],
                    ));
                }
                v
            }
            (GID_RF, OID_RF_DEACTIVATE) => vec![
                ok(GID_RF, OID_RF_DEACTIVATE),
                Packet::notification(GID_RF, OID_RF_DEACTIVATE, vec![DEACTIVATE_TYPE_IDLE, 0x00]),
            ],
            (GID_NFCEE, OID_NFCEE_DISCOVER) => {
                let mut v = vec![Packet::response(
                    GID_NFCEE,
                    OID_NFCEE_DISCOVER,
                    vec![STATUS_OK, self.cfg.slots.len() as u8],
                )];
                v.extend(
                    self.cfg
                        .slots
                        .iter()
                        .map(|s| Packet::notification(GID_NFCEE, OID_NFCEE_DISCOVER, s.clone())),
                );
                v
            }
            (GID_NFCEE, OID_NFCEE_MODE_SET) if version.is_v2() => vec![
                ok(GID_NFCEE, OID_NFCEE_MODE_SET),
                Packet::notification(GID_NFCEE, OID_NFCEE_MODE_SET, vec![STATUS_OK]),
            ],
            (gid, oid) => vec![ok(gid, oid)],
        }
    }
}

/// Callbacks that record everything and let tests wait for events.
#[doc(hidden)]
#[derive(Default)]
pub struct RecordingCallbacks {
    events: Mutex<Vec<(HalEvent, Status)>>,
    data: Mutex<Vec<Packet>>,
    event_cv: Condvar,
    data_cv: Condvar,
}

impl RecordingCallbacks {
    /// Empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Events seen so far.
    pub fn events(&self) -> Vec<(HalEvent, Status)> {
        lock(&self.events).clone()
    }

    /// Packets forwarded through `on_data`.
    pub fn data(&self) -> Vec<Packet> {
        lock(&self.data).clone()
    }

    /// Wait until `event` was recorded; returns its status.
    pub fn wait_for(&self, event: HalEvent, timeout: Duration) -> Option<Status> {
        let deadline = deadline_after(timeout);
        let mut events = lock(&self.events);
        loop {
            if let Some((_, status)) = events.iter().find(|(e, _)| *e == event) {
                return Some(*status);
            }
            let left = remaining(deadline)?;
            events = match self.event_cv.wait_timeout(events, left) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Wait until an inbound packet satisfying `pred` was forwarded.
    pub fn wait_for_data<F>(&self, pred: F, timeout: Duration) -> Option<Packet>
    where
        F: Fn(&Packet) -> bool,
    {
        let deadline = deadline_after(timeout);
        let mut data = lock(&self.data);
        loop {
            if let Some(p) = data.iter().find(|p| pred(p)) {
                return Some(p.clone());
            }
            let left = remaining(deadline)?;
            data = match self.data_cv.wait_timeout(data, left) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl HalCallbacks for RecordingCallbacks {
    fn on_event(&self, event: HalEvent, status: Status) {
        lock(&self.events).push((event, status));
        self.event_cv.notify_all();
    }

    fn on_data(&self, packet: &Packet) {
        lock(&self.data).push(packet.clone());
        self.data_cv.notify_all();
    }
}

/// NFC-forum subsystem stand-in recording relinquish/reclaim calls
/// together with how many frames the link had seen at that moment.
#[doc(hidden)]
pub struct RecordingSubsystem {
    link: Arc<MockLink>,
    calls: Mutex<Vec<(&'static str, usize)>>,
}

impl RecordingSubsystem {
    /// Recorder bound to `link`.
    pub fn new(link: Arc<MockLink>) -> Arc<Self> {
        Arc::new(Self {
            link,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Calls with the link's write count at the time.
    pub fn calls(&self) -> Vec<(&'static str, usize)> {
        lock(&self.calls).clone()
    }

    fn record(&self, what: &'static str) {
        let written = self.link.written().len();
        lock(&self.calls).push((what, written));
    }
}

impl NfcSubsystem for RecordingSubsystem {
    fn relinquish(&self) -> Result<()> {
        self.record("relinquish");
        Ok(())
    }

    fn reclaim(&self) -> Result<()> {
        self.record("reclaim");
        Ok(())
    }
}
