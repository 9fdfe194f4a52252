// emvco-hal-rs/emvco-hal/src/protocol/commands/nfcee.rs

use crate::constants::{NFCEE_MODE_DISABLE, NFCEE_MODE_ENABLE};
use crate::types::{NciVersion, SlotId};

/// NFCEE_DISCOVER_CMD payload. 1.x controllers take an explicit
/// "enable discovery" byte.
pub fn encode_nfcee_discover(version: NciVersion) -> Vec<u8> {
    if version.is_v2() { Vec::new() } else { vec![0x01] }
}

/// NFCEE_MODE_SET_CMD payload.
pub fn encode_nfcee_mode_set(slot: SlotId, enable: bool) -> Vec<u8> {
    let mode = if enable {
        NFCEE_MODE_ENABLE
    } else {
        NFCEE_MODE_DISABLE
    };
    vec![slot.as_u8(), mode]
}
