// emvco-hal-rs/emvco-hal/src/protocol/commands/mod.rs

/// CORE group payloads.
pub mod core_group;
/// NFCEE group payloads.
pub mod nfcee;
/// RF group payloads.
pub mod rf;

pub use core_group::{
    encode_conn_close, encode_conn_create_nfcee, encode_core_init, encode_core_reset,
};
pub use nfcee::{encode_nfcee_discover, encode_nfcee_mode_set};
pub use rf::{encode_rf_deactivate, encode_rf_discover};

use crate::constants::*;
use crate::protocol::Packet;
use crate::types::{ChannelId, NciVersion, PollMask, SlotId};

/// High-level Command enum. New commands should be added here and their
/// payload encoder placed in `protocol::commands::<group>.rs`.
#[derive(Debug, Clone)]
pub enum Command {
    /// CORE_RESET_CMD.
    CoreReset {
        /// Keep or reset the configuration.
        reset_type: u8,
    },
    /// CORE_INIT_CMD; 2.x controllers take a two-byte payload.
    CoreInit {
        /// Version learned from the reset.
        version: NciVersion,
    },
    /// CORE_CONN_CREATE_CMD towards an NFCEE.
    CoreConnCreate {
        /// Target slot.
        slot: SlotId,
        /// Protocol the connection speaks.
        protocol: u8,
    },
    /// CORE_CONN_CLOSE_CMD.
    CoreConnClose {
        /// Connection to close.
        channel: ChannelId,
    },
    /// RF_DISCOVER_CMD.
    RfDiscover {
        /// Technologies to poll.
        mask: PollMask,
    },
    /// RF_DEACTIVATE_CMD.
    RfDeactivate {
        /// Deactivation type.
        kind: u8,
    },
    /// NFCEE_DISCOVER_CMD; 1.x controllers need an action byte.
    NfceeDiscover {
        /// Negotiated version.
        version: NciVersion,
    },
    /// NFCEE_MODE_SET_CMD.
    NfceeModeSet {
        /// Target slot.
        slot: SlotId,
        /// Enable or disable.
        enable: bool,
    },
}

impl Command {
    /// Group id.
    pub fn gid(&self) -> u8 {
        match self {
            Self::CoreReset { .. }
            | Self::CoreInit { .. }
            | Self::CoreConnCreate { .. }
            | Self::CoreConnClose { .. } => GID_CORE,
            Self::RfDiscover { .. } | Self::RfDeactivate { .. } => GID_RF,
            Self::NfceeDiscover { .. } | Self::NfceeModeSet { .. } => GID_NFCEE,
        }
    }

    /// Opcode id.
    pub fn oid(&self) -> u8 {
        match self {
            Self::CoreReset { .. } => OID_CORE_RESET,
            Self::CoreInit { .. } => OID_CORE_INIT,
            Self::CoreConnCreate { .. } => OID_CORE_CONN_CREATE,
            Self::CoreConnClose { .. } => OID_CORE_CONN_CLOSE,
            Self::RfDiscover { .. } => OID_RF_DISCOVER,
            Self::RfDeactivate { .. } => OID_RF_DEACTIVATE,
            Self::NfceeDiscover { .. } => OID_NFCEE_DISCOVER,
            Self::NfceeModeSet { .. } => OID_NFCEE_MODE_SET,
        }
    }

    /// Encode the command parameters (payload without header).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::CoreReset { reset_type } => encode_core_reset(*reset_type),
            Self::CoreInit { version } => encode_core_init(*version),
            Self::CoreConnCreate { slot, protocol } => encode_conn_create_nfcee(*slot, *protocol),
            Self::CoreConnClose { channel } => encode_conn_close(*channel),
            Self::RfDiscover { mask } => encode_rf_discover(*mask),
            Self::RfDeactivate { kind } => encode_rf_deactivate(*kind),
            Self::NfceeDiscover { version } => encode_nfcee_discover(*version),
            Self::NfceeModeSet { slot, enable } => encode_nfcee_mode_set(*slot, *enable),
        }
    }

    /// Command packet ready for the exchange.
    pub fn to_packet(&self) -> Packet {
        Packet::command(self.gid(), self.oid(), self.encode())
    }
}
