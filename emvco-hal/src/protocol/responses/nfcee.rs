// emvco-hal-rs/emvco-hal/src/protocol/responses/nfcee.rs

use std::convert::TryFrom;

use crate::protocol::parser::{byte_at, expect_status_ok, slice_at};
use crate::types::{InfoTlv, SlotId, SlotStatus, TdaSlot};
use crate::Result;

/// NFCEE_DISCOVER_RSP: number of slots that will be announced.
pub fn decode_nfcee_discover_response(data: &[u8]) -> Result<u8> {
    expect_status_ok(data)?;
    byte_at(data, 1)
}

/// NFCEE_DISCOVER_NTF describing one contact slot.
///
/// Layout: `id, status, n, protocol[n], m, (tag, len, value[len])[m]`;
/// trailing bytes (power supply on 2.x) are ignored.
pub fn decode_nfcee_info(data: &[u8]) -> Result<TdaSlot> {
    let id = SlotId::new(byte_at(data, 0)?);
    let status = SlotStatus::try_from(byte_at(data, 1)?)?;

    let n = byte_at(data, 2)? as usize;
    let protocols = slice_at(data, 3, n)?.to_vec();

    let mut idx = 3 + n;
    let m = byte_at(data, idx)? as usize;
    idx += 1;
    let mut card_info = Vec::with_capacity(m);
    for _ in 0..m {
        let tag = byte_at(data, idx)?;
        let len = byte_at(data, idx + 1)? as usize;
        let value = slice_at(data, idx + 2, len)?.to_vec();
        card_info.push(InfoTlv { tag, value });
        idx += 2 + len;
    }

    Ok(TdaSlot {
        id,
        status,
        protocols,
        card_info,
        channel: None,
    })
}

/// NFCEE_MODE_SET_NTF (2.x only): status of the mode change.
pub fn decode_mode_set_notification(data: &[u8]) -> Result<()> {
    expect_status_ok(data)
}
