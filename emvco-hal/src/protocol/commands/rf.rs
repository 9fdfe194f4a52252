// emvco-hal-rs/emvco-hal/src/protocol/commands/rf.rs

use crate::constants::{
    DISCOVERY_FREQUENCY, NFC_A_PASSIVE_POLL_MODE, NFC_B_PASSIVE_POLL_MODE,
    NFC_F_PASSIVE_POLL_MODE, NFC_VAS_POLL_MODE,
};
use crate::types::PollMask;

/// RF_DISCOVER_CMD payload: one (technology, frequency) pair per bit set
/// in `mask`, in A, B, F, VAS order.
pub fn encode_rf_discover(mask: PollMask) -> Vec<u8> {
    let techs = [
        (PollMask::A, NFC_A_PASSIVE_POLL_MODE),
        (PollMask::B, NFC_B_PASSIVE_POLL_MODE),
        (PollMask::F, NFC_F_PASSIVE_POLL_MODE),
        (PollMask::VAS, NFC_VAS_POLL_MODE),
    ];
    let configs: Vec<u8> = techs
        .iter()
        .filter(|(bit, _)| mask.contains(*bit))
        .map(|(_, mode)| *mode)
        .collect();

    let mut buf = Vec::with_capacity(1 + configs.len() * 2);
    buf.push(configs.len() as u8);
    for mode in configs {
        buf.push(mode);
        buf.push(DISCOVERY_FREQUENCY);
    }
    buf
}

/// RF_DEACTIVATE_CMD payload.
pub fn encode_rf_deactivate(kind: u8) -> Vec<u8> {
    vec![kind]
}
