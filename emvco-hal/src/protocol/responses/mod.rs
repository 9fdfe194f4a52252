// emvco-hal-rs/emvco-hal/src/protocol/responses/mod.rs

/// CORE group decoders.
pub mod core_group;
/// NFCEE group decoders.
pub mod nfcee;
/// RF group decoders.
pub mod rf;

pub use core_group::{
    ConnCreateResponse, CreditsNotification, InitResponse, ResetNotification, ResetResponse,
    decode_conn_create_response, decode_credits_notification, decode_init_response,
    decode_reset_notification, decode_reset_response,
};
pub use nfcee::{decode_mode_set_notification, decode_nfcee_discover_response, decode_nfcee_info};
pub use rf::{
    DeactivateNotification, IntfActivatedNotification, decode_deactivate_notification,
    decode_intf_activated,
};

use crate::constants::*;
use crate::protocol::{MessageType, Packet};
use crate::{Error, Result};

/// Control notifications the engine itself reacts to. Per-opcode decoders
/// live in `protocol::responses::<group>.rs` and are dispatched here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// CORE_RESET_NTF.
    CoreReset(ResetNotification),
    /// CORE_CONN_CREDITS_NTF.
    ConnCredits(CreditsNotification),
    /// CORE_GENERIC_ERROR_NTF with its status.
    GenericError(u8),
    /// RF_INTF_ACTIVATED_NTF.
    IntfActivated(IntfActivatedNotification),
    /// RF_DEACTIVATE_NTF.
    Deactivate(DeactivateNotification),
}

impl Notification {
    /// Decode a notification packet. Returns `Ok(None)` for notifications
    /// the engine only forwards.
    pub fn decode(packet: &Packet) -> Result<Option<Self>> {
        if packet.mt != MessageType::Notification {
            return Err(Error::FrameFormat(format!("not a notification: {}", packet)));
        }
        let data = &packet.payload[..];
        let n = match (packet.gid, packet.oid) {
            (GID_CORE, OID_CORE_RESET) => Self::CoreReset(decode_reset_notification(data)?),
            (GID_CORE, OID_CORE_CONN_CREDITS) => {
                Self::ConnCredits(decode_credits_notification(data)?)
            }
            (GID_CORE, OID_CORE_GENERIC_ERROR) => {
                Self::GenericError(crate::protocol::parser::byte_at(data, 0)?)
            }
            (GID_RF, OID_RF_INTF_ACTIVATED) => Self::IntfActivated(decode_intf_activated(data)?),
            (GID_RF, OID_RF_DEACTIVATE) => {
                Self::Deactivate(decode_deactivate_notification(data)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(n))
    }
}

/// Check that `packet` is the response to the command `(gid, oid)` and
/// that it reports success.
pub fn expect_response(packet: &Packet, gid: u8, oid: u8) -> Result<()> {
    if !packet.is(MessageType::Response, gid, oid) {
        return Err(Error::UnexpectedResponse {
            expected: ((gid as u16) << 8) | oid as u16,
            actual: packet.opcode(),
        });
    }
    crate::protocol::parser::expect_status_ok(&packet.payload)
}
