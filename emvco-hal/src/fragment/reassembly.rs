// emvco-hal-rs/emvco-hal/src/fragment/reassembly.rs

use log::{debug, error, warn};

use crate::protocol::{Frame, MessageType, Packet};
use crate::{Error, Result};

/// Stream a chain belongs to: message type plus GID (or connection id)
/// and OID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChainKey {
    mt: MessageType,
    gid: u8,
    oid: u8,
}

/// Inbound reassembly buffer with a fixed capacity.
///
/// Segments (PBF set) are appended; the closing segment of the same stream
/// yields the whole packet and empties the buffer. A complete frame of any
/// other stream passes through untouched, even while a chain is open.
///
/// Once a chain is dropped (overflow, or interrupted by another stream),
/// the rest of that message is swallowed up to and including its closing
/// segment, so no part of it is ever delivered.
#[derive(Debug)]
pub struct Reassembler {
    buf: Vec<u8>,
    capacity: usize,
    chain: Option<ChainKey>,
    discarding: Option<ChainKey>,
}

impl Reassembler {
    /// Empty buffer holding at most `capacity` payload bytes per message.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            chain: None,
            discarding: None,
        }
    }

    /// Maximum size of a reassembled payload.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes accumulated for the open chain.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True while a chain is open.
    pub fn is_chained(&self) -> bool {
        self.chain.is_some()
    }

    /// True while the remainder of a dropped message is being swallowed.
    pub fn is_discarding(&self) -> bool {
        self.discarding.is_some()
    }

    /// Drop any partial message and forget any stream being discarded.
    pub fn reset(&mut self) {
        self.drop_chain();
        self.discarding = None;
    }

    fn drop_chain(&mut self) {
        self.buf.clear();
        self.chain = None;
    }

    /// Feed one wire frame. Returns the completed packet, if any.
    ///
    /// A malformed frame is rejected without touching the buffer. A frame
    /// that would overflow the capacity is dropped together with the
    /// partial message and reported as `ReassemblyOverflow`; the segments
    /// of that message still to come are then swallowed.
    pub fn push(&mut self, frame: &[u8]) -> Result<Option<Packet>> {
        let (h, payload) = Frame::decode(frame)?;
        let key = ChainKey {
            mt: h.mt,
            gid: h.gid,
            oid: h.oid,
        };

        if self.discarding == Some(key) {
            debug!(
                "discarding {} bytes of dropped {:?}{}",
                payload.len(),
                key,
                if h.pbf { "" } else { " (closing segment)" }
            );
            if !h.pbf {
                self.discarding = None;
            }
            return Ok(None);
        }

        if h.pbf {
            if let Some(open) = self.chain {
                if open != key {
                    warn!(
                        "segment for {:?} interrupts open chain {:?}; dropping {} buffered bytes",
                        key,
                        open,
                        self.buf.len()
                    );
                    self.drop_chain();
                    self.discarding = Some(open);
                }
            }
            self.append(key, true, payload)?;
            self.chain = Some(key);
            return Ok(None);
        }

        if self.chain == Some(key) {
            self.append(key, false, payload)?;
            let payload = std::mem::take(&mut self.buf);
            self.drop_chain();
            return Ok(Some(Packet::new(h.mt, h.gid, h.oid, payload)));
        }

        Ok(Some(Packet::new(h.mt, h.gid, h.oid, payload.to_vec())))
    }

    fn append(&mut self, key: ChainKey, more: bool, payload: &[u8]) -> Result<()> {
        let needed = self.buf.len() + payload.len();
        if needed > self.capacity {
            error!(
                "reassembly overflow: {} bytes exceeds capacity {}, frame dropped",
                needed, self.capacity
            );
            self.drop_chain();
            if more {
                self.discarding = Some(key);
            }
            return Err(Error::ReassemblyOverflow {
                needed,
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(payload);
        Ok(())
    }
}
