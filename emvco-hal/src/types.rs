// emvco-hal-rs/emvco-hal/src/types.rs

use std::convert::TryFrom;
use std::fmt;

use derive_more::{Display, From};

use crate::Error;
use crate::constants::{NCI_VERSION_2_0, RF_PROTOCOL_ISO_DEP};

/// Persona currently spoken by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Profile {
    /// Not determined yet.
    #[display(fmt = "UNKNOWN")]
    Unknown,
    /// Regular NFC stack in control.
    #[display(fmt = "NFC_FORUM")]
    NfcForum,
    /// Payment persona in control.
    #[display(fmt = "EMVCO")]
    Emvco,
}

impl Default for Profile {
    fn default() -> Self {
        Profile::Unknown
    }
}

/// State reported by (or requested from) the cooperating NFC subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NfcState {
    /// Subsystem running.
    #[display(fmt = "ON")]
    On,
    /// Subsystem stopped.
    #[display(fmt = "OFF")]
    Off,
}

/// Power line states driven through the link driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PowerState {
    /// Controller unpowered.
    #[display(fmt = "OFF")]
    Off,
    /// Controller powered.
    #[display(fmt = "ON")]
    On,
    /// Low-power idle; the controller wakes on the next write.
    #[display(fmt = "STANDBY")]
    Standby,
}

/// Polling technology bitmask - Newtype Pattern.
///
/// Bits: A = 0x01, B = 0x02, F = 0x04, VAS = 0x08. Only the combinations in
/// [`PollMask::ALLOWED`] are accepted by the payment persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From)]
pub struct PollMask(u8);

impl PollMask {
    /// NFC-A.
    pub const A: u8 = 0x01;
    /// NFC-B.
    pub const B: u8 = 0x02;
    /// NFC-F.
    pub const F: u8 = 0x04;
    /// Value-added services polling.
    pub const VAS: u8 = 0x08;

    /// Allow-list of technology combinations.
    pub const ALLOWED: [u8; 8] = [
        Self::A,
        Self::B,
        Self::A | Self::B,
        Self::F,
        Self::A | Self::B | Self::F,
        Self::A | Self::VAS,
        Self::A | Self::B | Self::VAS,
        Self::A | Self::B | Self::F | Self::VAS,
    ];

    /// Wrap raw bits without validation.
    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// True when the mask is on the allow-list.
    pub fn is_valid(&self) -> bool {
        Self::ALLOWED.contains(&self.0)
    }

    /// True when `tech` is part of the mask.
    pub fn contains(&self, tech: u8) -> bool {
        self.0 & tech == tech
    }

    /// Validate a raw mask against the allow-list.
    pub fn validate(bits: u8) -> crate::Result<Self> {
        let mask = Self(bits);
        if mask.is_valid() {
            Ok(mask)
        } else {
            Err(Error::InvalidParameter(format!(
                "poll mask {:#06b} not in allow-list",
                bits
            )))
        }
    }
}

impl fmt::Display for PollMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Self::A) {
            parts.push("A");
        }
        if self.contains(Self::B) {
            parts.push("B");
        }
        if self.contains(Self::F) {
            parts.push("F");
        }
        if self.contains(Self::VAS) {
            parts.push("VAS");
        }
        if parts.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", parts.join("|"))
        }
    }
}

/// Contact slot identifier (the execution-environment id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From)]
pub struct SlotId(u8);

impl SlotId {
    /// Slot with the given NFCEE id.
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Raw id.
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// Logical channel (connection id) multiplexed on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Channel with the given connection id.
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Raw connection id.
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// Slot status as reported during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Card present and usable.
    Enabled,
    /// Slot switched off.
    Disabled,
    /// Slot did not answer.
    Unresponsive,
}

impl TryFrom<u8> for SlotStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Enabled),
            0x01 => Ok(Self::Disabled),
            0x02 => Ok(Self::Unresponsive),
            other => Err(Error::FrameFormat(format!("unknown slot status {:#04x}", other))),
        }
    }
}

/// Type-length-value entry describing a contact card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoTlv {
    /// Tag byte.
    pub tag: u8,
    /// Value bytes.
    pub value: Vec<u8>,
}

/// Contact slot as exposed to the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdaSlot {
    /// NFCEE id of the slot.
    pub id: SlotId,
    /// Discovery status.
    pub status: SlotStatus,
    /// Advertised protocols, in order of preference.
    pub protocols: Vec<u8>,
    /// Card details from the discovery notification.
    pub card_info: Vec<InfoTlv>,
    /// Valid only while the slot is open.
    pub channel: Option<ChannelId>,
}

impl TdaSlot {
    /// Protocol used for the connection: the first advertised one.
    pub fn primary_protocol(&self) -> Option<u8> {
        self.protocols.first().copied()
    }
}

/// Protocol version learned during the reset exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NciVersion(u8);

impl NciVersion {
    /// Version from its raw byte (major nibble, minor nibble).
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw version byte.
    pub fn raw(&self) -> u8 {
        self.0
    }

    /// Major version.
    pub fn major(&self) -> u8 {
        self.0 >> 4
    }

    /// Minor version.
    pub fn minor(&self) -> u8 {
        self.0 & 0x0F
    }

    /// 2.x controllers announce the version in a reset notification and
    /// expect a two-byte CORE_INIT payload.
    pub fn is_v2(&self) -> bool {
        self.0 >= NCI_VERSION_2_0
    }
}

impl fmt::Display for NciVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Identity and capabilities collected during the reset/init handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerInfo {
    /// Negotiated version.
    pub version: NciVersion,
    /// Present on 2.x controllers.
    pub manufacturer_id: Option<u8>,
    /// Firmware and vendor bytes from the reset notification.
    pub manufacturer_info: Vec<u8>,
    /// Feature bytes of CORE_INIT_RSP.
    pub features: [u8; 4],
}

impl ControllerInfo {
    /// Manufacturer info as spaced hex.
    pub fn firmware_hex(&self) -> String {
        crate::utils::bytes_to_hex_spaced(&self.manufacturer_info)
    }
}

/// Whether an activated RF protocol can be served by the payment persona.
pub fn is_supported_card_protocol(protocol: u8) -> bool {
    protocol == RF_PROTOCOL_ISO_DEP
}
