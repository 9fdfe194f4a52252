// emvco-hal-rs/emvco-hal/src/protocol/commands/core_group.rs

use crate::constants::{DEST_PARAM_NFCEE, DEST_TYPE_NFCEE};
use crate::types::{ChannelId, NciVersion, SlotId};

/// CORE_RESET_CMD payload.
pub fn encode_core_reset(reset_type: u8) -> Vec<u8> {
    vec![reset_type]
}

/// CORE_INIT_CMD payload. 2.x controllers take two feature-enable bytes,
/// 1.x controllers an empty payload.
pub fn encode_core_init(version: NciVersion) -> Vec<u8> {
    if version.is_v2() {
        vec![0x00, 0x00]
    } else {
        Vec::new()
    }
}

/// CORE_CONN_CREATE_CMD payload targeting a contact slot.
pub fn encode_conn_create_nfcee(slot: SlotId, protocol: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(6);
    buf.push(DEST_TYPE_NFCEE);
    buf.push(0x01); // one destination-specific parameter
    buf.push(DEST_PARAM_NFCEE);
    buf.push(0x02); // parameter length
    buf.push(slot.as_u8());
    buf.push(protocol);
    buf
}

/// CORE_CONN_CLOSE_CMD payload.
pub fn encode_conn_close(channel: ChannelId) -> Vec<u8> {
    vec![channel.as_u8()]
}
