// emvco-hal-rs/emvco-hal/src/tda/manager.rs

//! Slot table and the transition handlers that drive it.
//!
//! One mutex covers the whole table and is held across every slot
//! operation, I/O included, so only one contact-card operation is visible
//! to the controller at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};

use super::state::SlotState;
use crate::config::HalConfig;
use crate::constants::{CREDITS_FLOW_CONTROL_DISABLED, GID_NFCEE, OID_NFCEE_DISCOVER, OID_NFCEE_MODE_SET};
use crate::protocol::Command;
use crate::protocol::responses::{
    decode_conn_create_response, decode_mode_set_notification, decode_nfcee_discover_response,
    decode_nfcee_info,
};
use crate::sync::{Exchange, Filter};
use crate::types::{ChannelId, NciVersion, SlotId, SlotStatus, TdaSlot};
use crate::utils::lock;
use crate::{Error, Result};

/// Contact-slot settings, derived from [`HalConfig`].
#[derive(Debug, Clone)]
pub struct TdaConfig {
    /// Feature and variant both enabled.
    pub supported: bool,
    /// Wait for discovery and mode-set notifications.
    pub notification_timeout: Duration,
    /// Wait for an APDU response.
    pub transceive_timeout: Duration,
}

impl From<&HalConfig> for TdaConfig {
    fn from(cfg: &HalConfig) -> Self {
        Self {
            supported: cfg.tda_supported(),
            notification_timeout: cfg.notification_timeout(),
            transceive_timeout: cfg.transceive_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Connection {
    channel: ChannelId,
    max_payload: usize,
    flow_control: bool,
}

#[derive(Debug)]
struct SlotEntry {
    slot: TdaSlot,
    state: SlotState,
    // survives a partial close
    mode_enabled: bool,
    conn: Option<Connection>,
}

impl SlotEntry {
    fn advance(&mut self, to: SlotState) -> Result<()> {
        self.state = self.state.transition(to)?;
        debug!("slot {}: {}", self.slot.id, self.state);
        Ok(())
    }

    fn is_parked(&self) -> bool {
        self.state == SlotState::CoreConnClosed && self.mode_enabled
    }
}

/// Contact-slot table and its state machine.
pub struct TdaManager {
    cfg: TdaConfig,
    table: Mutex<Vec<SlotEntry>>,
    stale: AtomicBool,
}

impl TdaManager {
    /// Empty table.
    pub fn new(cfg: TdaConfig) -> Self {
        Self {
            cfg,
            table: Mutex::new(Vec::new()),
            stale: AtomicBool::new(false),
        }
    }

    /// False makes every slot operation fail with `FeatureNotSupported`.
    pub fn is_supported(&self) -> bool {
        self.cfg.supported
    }

    /// Discovered slots with their current channel.
    pub fn slots(&self) -> Vec<TdaSlot> {
        self.table().iter().map(|e| e.slot.clone()).collect()
    }

    /// State of slot `id`, if discovered.
    pub fn state_of(&self, id: SlotId) -> Option<SlotState> {
        self.table().iter().find(|e| e.slot.id == id).map(|e| e.state)
    }

    /// True when any slot has a live connection.
    pub fn has_open_slot(&self) -> bool {
        self.table().iter().any(|e| e.state.is_open())
    }

    /// Mark the table stale after the controller lost its state; it is
    /// dropped at the start of the next operation. Never blocks.
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    /// Enumerate the contact slots.
    pub fn discover(&self, ex: &Exchange, version: NciVersion) -> Result<Vec<TdaSlot>> {
        self.ensure_supported()?;
        let mut table = self.table();
        if let Some(busy) = table.iter().find(|e| e.state.is_open() || e.mode_enabled) {
            return Err(Error::State(format!(
                "slot {} is {}; close it before discovery",
                busy.slot.id, busy.state
            )));
        }

        let slots = self.query_slots(ex, version).map_err(|e| {
            warn!("slot discovery failed: {}", e);
            Error::FeatureNotSupported
        })?;
        if slots.is_empty() {
            info!("controller reports no contact slots");
            return Err(Error::FeatureNotSupported);
        }

        let mut entries = Vec::with_capacity(slots.len());
        for slot in &slots {
            let mut entry = SlotEntry {
                slot: slot.clone(),
                state: SlotState::Init,
                mode_enabled: false,
                conn: None,
            };
            entry.advance(SlotState::Discovered)?;
            entries.push(entry);
        }
        *table = entries;
        info!("discovered {} contact slot(s)", slots.len());
        Ok(slots)
    }

    fn query_slots(&self, ex: &Exchange, version: NciVersion) -> Result<Vec<TdaSlot>> {
        let announcements = ex.expect(Filter::Notification {
            gid: GID_NFCEE,
            oid: OID_NFCEE_DISCOVER,
        });
        let rsp = ex.execute(&Command::NfceeDiscover { version })?;
        let count = decode_nfcee_discover_response(&rsp.payload)? as usize;
        if count == 0 {
            return Ok(Vec::new());
        }
        announcements
            .wait(count, self.cfg.notification_timeout)?
            .iter()
            .map(|p| decode_nfcee_info(&p.payload))
            .collect()
    }

    /// Open `id` and return its logical channel. With `standby` a parked
    /// slot is resumed without re-enabling its mode.
    pub fn open(&self, ex: &Exchange, version: NciVersion, id: SlotId, standby: bool) -> Result<ChannelId> {
        self.ensure_supported()?;
        let mut table = self.table();
        let entry = find_mut(&mut table, id)?;
        match entry.state {
            SlotState::Init => return Err(Error::State(format!("slot {} not discovered", id))),
            SlotState::CoreConnCreated => {
                return Err(Error::State(format!("slot {} opened already", id)));
            }
            _ => {}
        }
        if entry.slot.status == SlotStatus::Unresponsive {
            return Err(Error::State(format!("slot {} is unresponsive", id)));
        }
        let protocol = entry
            .slot
            .primary_protocol()
            .ok_or_else(|| Error::State(format!("slot {} advertises no protocol", id)))?;

        let resume = standby && entry.is_parked();
        if standby && !resume {
            debug!("slot {} is not parked, running full open", id);
        }
        if !resume && entry.state != SlotState::ModeSetEnabled {
            self.mode_set(ex, version, id, true)?;
            entry.advance(SlotState::ModeSetEnabled)?;
            entry.mode_enabled = true;
        }

        let rsp = ex.execute(&Command::CoreConnCreate { slot: id, protocol })?;
        let created = decode_conn_create_response(&rsp.payload)?;
        entry.advance(SlotState::CoreConnCreated)?;
        entry.conn = Some(Connection {
            channel: created.channel,
            max_payload: usize::from(created.max_payload).max(1),
            flow_control: created.credits != CREDITS_FLOW_CONTROL_DISABLED,
        });
        entry.slot.channel = Some(created.channel);
        info!(
            "slot {} open on channel {} (max payload {}, credits {})",
            id, created.channel, created.max_payload, created.credits
        );
        Ok(created.channel)
    }

    /// Send an APDU on `channel` and wait for the card's answer.
    pub fn transceive(&self, ex: &Exchange, channel: ChannelId, apdu: &[u8]) -> Result<Vec<u8>> {
        self.ensure_supported()?;
        if apdu.is_empty() {
            return Err(Error::InvalidParameter("empty APDU".into()));
        }
        let table = self.table();
        let conn = table
            .iter()
            .filter(|e| e.state.is_open())
            .find_map(|e| e.conn.filter(|c| c.channel == channel))
            .ok_or_else(|| Error::State(format!("channel {} is not open", channel)))?;

        let answer = ex.expect(Filter::Data {
            conn: channel.as_u8(),
        });
        ex.send_data(channel, apdu, conn.max_payload, conn.flow_control)?;
        let rsp = answer.wait_one(self.cfg.transceive_timeout)?;
        drop(table);
        Ok(rsp.payload)
    }

    /// Close `id`. With `standby` the slot's mode is disabled as well;
    /// otherwise it stays parked for a cheap resume.
    ///
    /// Returns whether the link may enter standby power afterwards.
    pub fn close(&self, ex: &Exchange, version: NciVersion, id: SlotId, standby: bool) -> Result<bool> {
        self.ensure_supported()?;
        let mut table = self.table();
        let entry = find_mut(&mut table, id)?;
        let conn = match (entry.state, entry.conn) {
            (SlotState::CoreConnCreated, Some(conn)) => conn,
            (state, _) => return Err(Error::State(format!("slot {} is {}, not open", id, state))),
        };

        ex.execute(&Command::CoreConnClose {
            channel: conn.channel,
        })?;
        entry.advance(SlotState::CoreConnClosed)?;
        entry.conn = None;
        entry.slot.channel = None;

        if standby {
            self.mode_set(ex, version, id, false)?;
            entry.mode_enabled = false;
            info!("slot {} closed", id);
        } else {
            info!("slot {} parked", id);
        }

        Ok(standby && !table.iter().any(|e| e.state.is_open() || e.mode_enabled))
    }

    /// Close every open slot (best effort when an exchange is available)
    /// and forget the table.
    pub fn deinit(&self, ex: Option<&Exchange>) {
        let mut table = self.table();
        if let Some(ex) = ex {
            for entry in table.iter().filter(|e| e.state.is_open()) {
                if let Some(conn) = entry.conn {
                    if let Err(e) = ex.execute(&Command::CoreConnClose {
                        channel: conn.channel,
                    }) {
                        warn!("closing channel {} failed: {}", conn.channel, e);
                    }
                }
            }
        }
        if !table.is_empty() {
            info!("contact-slot table cleared");
        }
        table.clear();
    }

    fn mode_set(&self, ex: &Exchange, version: NciVersion, slot: SlotId, enable: bool) -> Result<()> {
        // 1.x controllers answer with the response only
        let ntf = version.is_v2().then(|| {
            ex.expect(Filter::Notification {
                gid: GID_NFCEE,
                oid: OID_NFCEE_MODE_SET,
            })
        });
        ex.execute(&Command::NfceeModeSet { slot, enable })?;
        if let Some(ntf) = ntf {
            let p = ntf.wait_one(self.cfg.notification_timeout)?;
            decode_mode_set_notification(&p.payload)?;
        }
        Ok(())
    }

    fn ensure_supported(&self) -> Result<()> {
        if self.cfg.supported {
            Ok(())
        } else {
            Err(Error::FeatureNotSupported)
        }
    }

    fn table(&self) -> MutexGuard<'_, Vec<SlotEntry>> {
        let mut table = lock(&self.table);
        if self.stale.swap(false, Ordering::SeqCst) {
            warn!("dropping contact-slot table after controller reset");
            table.clear();
        }
        table
    }
}

fn find_mut(table: &mut [SlotEntry], id: SlotId) -> Result<&mut SlotEntry> {
    table
        .iter_mut()
        .find(|e| e.slot.id == id)
        .ok_or_else(|| Error::InvalidParameter(format!("unknown slot {}", id)))
}
