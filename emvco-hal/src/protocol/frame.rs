// emvco-hal-rs/emvco-hal/src/protocol/frame.rs

use crate::constants::{
    GID_MASK, HEADER_LEN, MAX_FRAME_PAYLOAD, MT_COMMAND, MT_DATA, MT_MASK, MT_NOTIFICATION,
    MT_RESPONSE, MT_SHIFT, OID_MASK, PBF_MASK,
};
use crate::{Error, Result};

/// Message type carried in the top three bits of the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Data on a logical connection.
    Data,
    /// Host to controller.
    Command,
    /// Answer to a command.
    Response,
    /// Unsolicited controller message.
    Notification,
}

impl MessageType {
    /// Decode the three MT bits; 4..7 are reserved and rejected.
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            MT_DATA => Ok(Self::Data),
            MT_COMMAND => Ok(Self::Command),
            MT_RESPONSE => Ok(Self::Response),
            MT_NOTIFICATION => Ok(Self::Notification),
            other => Err(Error::FrameFormat(format!("unknown message type {}", other))),
        }
    }

    /// Encoded MT bits.
    pub fn bits(self) -> u8 {
        match self {
            Self::Data => MT_DATA,
            Self::Command => MT_COMMAND,
            Self::Response => MT_RESPONSE,
            Self::Notification => MT_NOTIFICATION,
        }
    }
}

/// Three-byte frame header.
///
/// Format: `[MT(3) | PBF(1) | GID(4)] [OID(6)] [LEN]`. For data frames the
/// GID nibble carries the connection id and the OID byte is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Message type.
    pub mt: MessageType,
    /// More segments follow.
    pub pbf: bool,
    /// Group id, or connection id for data.
    pub gid: u8,
    /// Opcode id; zero for data.
    pub oid: u8,
    /// Payload length.
    pub len: u8,
}

impl Header {
    /// Parse the first three bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::InvalidLength {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let mt = MessageType::from_bits((bytes[0] & MT_MASK) >> MT_SHIFT)?;
        Ok(Self {
            mt,
            pbf: bytes[0] & PBF_MASK != 0,
            gid: bytes[0] & GID_MASK,
            oid: if mt == MessageType::Data {
                0
            } else {
                bytes[1] & OID_MASK
            },
            len: bytes[2],
        })
    }

    /// Encode back to three bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut b0 = (self.mt.bits() << MT_SHIFT) | (self.gid & GID_MASK);
        if self.pbf {
            b0 |= PBF_MASK;
        }
        [b0, self.oid & OID_MASK, self.len]
    }

    /// Payload length as `usize`.
    pub fn payload_len(&self) -> usize {
        self.len as usize
    }
}

/// Wire frame helper: one header plus at most 255 payload bytes.
pub struct Frame;

impl Frame {
    /// Encode one frame. `payload` must fit the single length byte.
    pub fn encode(
        mt: MessageType,
        pbf: bool,
        gid: u8,
        oid: u8,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(Error::InvalidLength {
                expected: MAX_FRAME_PAYLOAD,
                actual: payload.len(),
            });
        }
        let header = Header {
            mt,
            pbf,
            gid,
            oid,
            len: payload.len() as u8,
        };
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(payload);
        Ok(out)
    }

    /// Split a complete frame into its header and payload. The frame length
    /// must match the header's length byte exactly.
    pub fn decode(frame: &[u8]) -> Result<(Header, &[u8])> {
        let header = Header::parse(frame)?;
        let required = HEADER_LEN + header.payload_len();
        if frame.len() != required {
            return Err(Error::InvalidLength {
                expected: required,
                actual: frame.len(),
            });
        }
        Ok((header, &frame[HEADER_LEN..]))
    }
}
