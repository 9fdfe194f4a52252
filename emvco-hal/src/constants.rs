// emvco-hal-rs/emvco-hal/src/constants.rs
//! Common protocol constants used across the crate

/// Length of the packet header: [MT|PBF|GID, OID, LEN]
pub const HEADER_LEN: usize = 3;

/// Largest payload a single frame can describe (one length byte)
pub const MAX_FRAME_PAYLOAD: usize = 255;

/// Message type: data (top three bits of byte 0)
pub const MT_DATA: u8 = 0x00;
/// Message type: command
pub const MT_COMMAND: u8 = 0x01;
/// Message type: response
pub const MT_RESPONSE: u8 = 0x02;
/// Message type: notification
pub const MT_NOTIFICATION: u8 = 0x03;

/// Position of the MT bits in byte 0
pub const MT_SHIFT: u8 = 5;
/// MT bits of byte 0
pub const MT_MASK: u8 = 0xE0;
/// Packet boundary flag: set on every segment except the last
pub const PBF_MASK: u8 = 0x10;
/// GID (or connection id) bits of byte 0
pub const GID_MASK: u8 = 0x0F;
/// OID bits of byte 1
pub const OID_MASK: u8 = 0x3F;

/// Group identifiers
pub const GID_CORE: u8 = 0x00;
/// RF management group
pub const GID_RF: u8 = 0x01;
/// NFCEE management group
pub const GID_NFCEE: u8 = 0x02;
/// Vendor group, passed through untouched
pub const GID_PROPRIETARY: u8 = 0x0F;

/// Core group opcodes
pub const OID_CORE_RESET: u8 = 0x00;
/// CORE_INIT
pub const OID_CORE_INIT: u8 = 0x01;
/// CORE_CONN_CREATE
pub const OID_CORE_CONN_CREATE: u8 = 0x04;
/// CORE_CONN_CLOSE
pub const OID_CORE_CONN_CLOSE: u8 = 0x05;
/// CORE_CONN_CREDITS (notification only)
pub const OID_CORE_CONN_CREDITS: u8 = 0x06;
/// CORE_GENERIC_ERROR (notification only)
pub const OID_CORE_GENERIC_ERROR: u8 = 0x07;

/// RF group opcodes
pub const OID_RF_DISCOVER: u8 = 0x03;
/// RF_INTF_ACTIVATED (notification only)
pub const OID_RF_INTF_ACTIVATED: u8 = 0x05;
/// RF_DEACTIVATE
pub const OID_RF_DEACTIVATE: u8 = 0x06;

/// NFCEE group opcodes
pub const OID_NFCEE_DISCOVER: u8 = 0x00;
/// NFCEE_MODE_SET
pub const OID_NFCEE_MODE_SET: u8 = 0x01;

/// Status byte of a successful response
pub const STATUS_OK: u8 = 0x00;

/// Protocol versions reported in the reset exchange
pub const NCI_VERSION_1_0: u8 = 0x10;
/// First version announcing itself in CORE_RESET_NTF
pub const NCI_VERSION_2_0: u8 = 0x20;

/// CORE_RESET_CMD reset type: keep configuration
pub const RESET_TYPE_KEEP_CONFIG: u8 = 0x00;

/// Reason code placed in a synthesized reset notification after the link
/// stopped accepting writes.
pub const RESET_TRIGGER_UNRECOVERABLE: u8 = 0xA3;

/// RF_DEACTIVATE types / reasons
pub const DEACTIVATE_TYPE_IDLE: u8 = 0x00;
/// Deactivation reason: RF link lost
pub const DEACTIVATE_REASON_RF_LINK_LOSS: u8 = 0x02;

/// RF protocol reported in RF_INTF_ACTIVATED_NTF that the payment
/// persona can serve.
pub const RF_PROTOCOL_ISO_DEP: u8 = 0x04;

/// RF_DISCOVER technology-and-mode values
pub const NFC_A_PASSIVE_POLL_MODE: u8 = 0x00;
/// NFC-B passive poll
pub const NFC_B_PASSIVE_POLL_MODE: u8 = 0x01;
/// NFC-F passive poll
pub const NFC_F_PASSIVE_POLL_MODE: u8 = 0x02;
/// Proprietary VAS poll
pub const NFC_VAS_POLL_MODE: u8 = 0x74;
/// Discovery frequency: poll every period
pub const DISCOVERY_FREQUENCY: u8 = 0x01;

/// CORE_CONN_CREATE destination type for an execution environment
pub const DEST_TYPE_NFCEE: u8 = 0x03;
/// Destination parameter type carrying the NFCEE id
pub const DEST_PARAM_NFCEE: u8 = 0x01;

/// NFCEE_MODE_SET: disable
pub const NFCEE_MODE_DISABLE: u8 = 0x00;
/// NFCEE_MODE_SET: enable
pub const NFCEE_MODE_ENABLE: u8 = 0x01;

/// Initial credit value meaning "flow control not used"
pub const CREDITS_FLOW_CONTROL_DISABLED: u8 = 0xFF;
