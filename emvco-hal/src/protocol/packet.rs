// emvco-hal-rs/emvco-hal/src/protocol/packet.rs

use std::fmt;

use super::frame::{Frame, MessageType};
use crate::{Error, Result};

/// Logical message exchanged with the controller.
///
/// A packet is what remains after reassembly: its payload may exceed what a
/// single frame can carry and is split again by [`crate::fragment`] on the
/// way out. For data packets `gid` is the connection id and `oid` is 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Message type.
    pub mt: MessageType,
    /// Group id, or connection id for data.
    pub gid: u8,
    /// Opcode id.
    pub oid: u8,
    /// Complete payload.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Packet from its parts.
    pub fn new(mt: MessageType, gid: u8, oid: u8, payload: Vec<u8>) -> Self {
        Self {
            mt,
            gid,
            oid,
            payload,
        }
    }

    /// Command packet.
    pub fn command(gid: u8, oid: u8, payload: Vec<u8>) -> Self {
        Self::new(MessageType::Command, gid, oid, payload)
    }

    /// Response packet.
    pub fn response(gid: u8, oid: u8, payload: Vec<u8>) -> Self {
        Self::new(MessageType::Response, gid, oid, payload)
    }

    /// Notification packet.
    pub fn notification(gid: u8, oid: u8, payload: Vec<u8>) -> Self {
        Self::new(MessageType::Notification, gid, oid, payload)
    }

    /// Data packet on connection `conn`.
    pub fn data(conn: u8, payload: Vec<u8>) -> Self {
        Self::new(MessageType::Data, conn, 0, payload)
    }

    /// Decode a single unsegmented frame.
    pub fn from_frame(frame: &[u8]) -> Result<Self> {
        let (h, payload) = Frame::decode(frame)?;
        if h.pbf {
            return Err(Error::FrameFormat(
                "segmented frame needs reassembly".into(),
            ));
        }
        Ok(Self::new(h.mt, h.gid, h.oid, payload.to_vec()))
    }

    /// Encode as a single frame; fails when the payload needs segmenting.
    pub fn to_frame(&self) -> Result<Vec<u8>> {
        Frame::encode(self.mt, false, self.gid, self.oid, &self.payload)
    }

    /// `GID << 8 | OID`, the key responses are matched on.
    pub fn opcode(&self) -> u16 {
        ((self.gid as u16) << 8) | self.oid as u16
    }

    /// True for this exact type and opcode.
    pub fn is(&self, mt: MessageType, gid: u8, oid: u8) -> bool {
        self.mt == mt && self.gid == gid && self.oid == oid
    }

    /// True for commands.
    pub fn is_command(&self) -> bool {
        self.mt == MessageType::Command
    }

    /// True for data packets.
    pub fn is_data(&self) -> bool {
        self.mt == MessageType::Data
    }

    /// Connection id of a data packet.
    pub fn conn_id(&self) -> Option<u8> {
        if self.is_data() { Some(self.gid) } else { None }
    }

    /// First payload byte, the status of responses.
    pub fn status(&self) -> Option<u8> {
        self.payload.first().copied()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mt {
            MessageType::Data => write!(
                f,
                "DATA conn={} len={}",
                self.gid,
                self.payload.len()
            ),
            mt => write!(
                f,
                "{:?} {:02x}/{:02x} len={}",
                mt,
                self.gid,
                self.oid,
                self.payload.len()
            ),
        }
    }
}
