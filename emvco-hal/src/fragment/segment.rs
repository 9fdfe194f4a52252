// emvco-hal-rs/emvco-hal/src/fragment/segment.rs

use crate::constants::MAX_FRAME_PAYLOAD;
use crate::protocol::{Frame, Packet};
use crate::{Error, Result};

/// Split `packet` into wire frames of at most `mtu` payload bytes.
///
/// Every frame except the last carries the PBF bit. A packet whose payload
/// fits the MTU (including an empty one) yields exactly one frame.
pub fn segment(packet: &Packet, mtu: usize) -> Result<Vec<Vec<u8>>> {
    if mtu == 0 || mtu > MAX_FRAME_PAYLOAD {
        return Err(Error::InvalidParameter(format!(
            "mtu {} outside 1..={}",
            mtu, MAX_FRAME_PAYLOAD
        )));
    }

    if packet.payload.len() <= mtu {
        return Ok(vec![Frame::encode(
            packet.mt,
            false,
            packet.gid,
            packet.oid,
            &packet.payload,
        )?]);
    }

    let count = packet.payload.len().div_ceil(mtu);
    let mut frames = Vec::with_capacity(count);
    for (i, chunk) in packet.payload.chunks(mtu).enumerate() {
        let more = i + 1 < count;
        frames.push(Frame::encode(packet.mt, more, packet.gid, packet.oid, chunk)?);
    }
    Ok(frames)
}
