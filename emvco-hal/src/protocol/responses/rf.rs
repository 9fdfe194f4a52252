// emvco-hal-rs/emvco-hal/src/protocol/responses/rf.rs

use crate::constants::DEACTIVATE_REASON_RF_LINK_LOSS;
use crate::protocol::parser::{byte_at, ensure_len};
use crate::Result;

/// Leading fields of RF_INTF_ACTIVATED_NTF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntfActivatedNotification {
    /// RF discovery id.
    pub discovery_id: u8,
    /// Activated RF interface.
    pub interface: u8,
    /// Activated RF protocol.
    pub protocol: u8,
    /// Technology and mode of the activation.
    pub tech_mode: u8,
}

/// Decode the leading fields of RF_INTF_ACTIVATED_NTF.
pub fn decode_intf_activated(data: &[u8]) -> Result<IntfActivatedNotification> {
    ensure_len(data, 4)?;
    Ok(IntfActivatedNotification {
        discovery_id: data[0],
        interface: data[1],
        protocol: data[2],
        tech_mode: data[3],
    })
}

/// RF_DEACTIVATE_NTF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeactivateNotification {
    /// Deactivation type.
    pub kind: u8,
    /// Deactivation reason.
    pub reason: u8,
}

impl DeactivateNotification {
    /// True when the RF link was lost.
    pub fn is_link_loss(&self) -> bool {
        self.reason == DEACTIVATE_REASON_RF_LINK_LOSS
    }
}

/// Decode RF_DEACTIVATE_NTF.
pub fn decode_deactivate_notification(data: &[u8]) -> Result<DeactivateNotification> {
    Ok(DeactivateNotification {
        kind: byte_at(data, 0)?,
        reason: byte_at(data, 1)?,
    })
}
