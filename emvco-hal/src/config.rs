// emvco-hal-rs/emvco-hal/src/config.rs
//! Engine tunables.
//!
//! The values are read once when the engine is built. Defaults match the
//! thresholds observed on shipping controllers; hardware variants override
//! them through a [`ConfigSource`] (the platform's key/value store).

use std::collections::HashMap;
use std::time::Duration;

use crate::utils::ms;
use crate::{Error, Result};

/// Path of the controller device (string).
pub const KEY_DEVICE_NODE: &str = "EMVCO_DEVICE_NODE";
/// Frame dumps at debug level (byte, non-zero enables).
pub const KEY_DEBUG_ENABLED: &str = "EMVCO_DEBUG_ENABLED";
/// Link MTU (byte).
pub const KEY_MAX_PAYLOAD: &str = "EMVCO_MAX_PAYLOAD";
/// Write attempts before recovery (byte).
pub const KEY_WRITE_RETRY_COUNT: &str = "EMVCO_WRITE_RETRY_COUNT";
/// Reset/init attempts (byte).
pub const KEY_HANDSHAKE_ATTEMPTS: &str = "EMVCO_HANDSHAKE_ATTEMPTS";
/// Write window wait, in ms (big-endian byte array).
pub const KEY_WINDOW_TIMEOUT_MS: &str = "EMVCO_WINDOW_TIMEOUT_MS";
/// Response wait, in ms (big-endian byte array).
pub const KEY_RESPONSE_TIMEOUT_MS: &str = "EMVCO_RESPONSE_TIMEOUT_MS";
/// APDU response wait, in ms (big-endian byte array).
pub const KEY_TRANSCEIVE_TIMEOUT_MS: &str = "EMVCO_TRANSCEIVE_TIMEOUT_MS";
/// Variant has contact slots (byte).
pub const KEY_TDA_ENABLED: &str = "EMVCO_TDA_ENABLED";

/// Value shapes offered by the platform key/value store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunableValue {
    /// Single numeric byte.
    Byte(u8),
    /// Byte array.
    Array(Vec<u8>),
    /// Text value.
    Str(String),
}

/// Read-only view of the platform key/value store.
pub trait ConfigSource {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<TunableValue>;
}

/// In-memory source, used by tests and hosts that pre-parse their files.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, TunableValue>,
}

impl MapSource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: TunableValue) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<TunableValue> {
        self.values.get(key).cloned()
    }
}

/// Every tunable of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HalConfig {
    /// Character device of the controller.
    pub device_node: String,
    /// Log every frame at debug level instead of trace.
    pub debug_enabled: bool,
    /// Link MTU: largest payload carried by one frame.
    pub max_payload: usize,
    /// Largest message joined from segments, inbound or raw outbound.
    pub reassembly_capacity: usize,
    /// Write attempts before the controller is power-cycled.
    pub write_retries: u32,
    /// Pause between write attempts.
    pub write_retry_delay_ms: u64,
    /// Read loop: wait per pending read before re-checking for shutdown.
    pub read_poll_ms: u64,
    /// Read backoff grows by this much per consecutive failure.
    pub read_backoff_step_ms: u64,
    /// Ceiling of the read backoff.
    pub read_backoff_max_ms: u64,
    /// Longest wait for the write window.
    pub window_timeout_ms: u64,
    /// Wait for a response before retransmitting.
    pub response_timeout_ms: u64,
    /// Retransmissions of a command whose response never came.
    pub command_retransmits: u8,
    /// Reset/init attempts, power cycling between them.
    pub handshake_attempts: u32,
    /// Off time of a power cycle.
    pub power_cycle_delay_ms: u64,
    /// Wait for a notification that follows a response.
    pub notification_timeout_ms: u64,
    /// Wait for the card's APDU response.
    pub transceive_timeout_ms: u64,
    /// Hardware variant exposes contact slots.
    pub tda_enabled: bool,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            device_node: "/dev/nxpnfc".to_string(),
            debug_enabled: false,
            max_payload: crate::constants::MAX_FRAME_PAYLOAD,
            reassembly_capacity: 4096,
            write_retries: 5,
            write_retry_delay_ms: 10,
            read_poll_ms: 100,
            read_backoff_step_ms: 10,
            read_backoff_max_ms: 500,
            window_timeout_ms: crate::utils::DEFAULT_WINDOW_TIMEOUT_MS,
            response_timeout_ms: 2000,
            command_retransmits: 1,
            handshake_attempts: 3,
            power_cycle_delay_ms: 10,
            notification_timeout_ms: 2000,
            transceive_timeout_ms: 5000,
            tda_enabled: true,
        }
    }
}

impl HalConfig {
    /// Defaults overridden by whatever recognised keys `source` holds.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(v) = source.get(KEY_DEVICE_NODE) {
            cfg.device_node = expect_str(KEY_DEVICE_NODE, v)?;
        }
        if let Some(v) = source.get(KEY_DEBUG_ENABLED) {
            cfg.debug_enabled = expect_byte(KEY_DEBUG_ENABLED, v)? != 0;
        }
        if let Some(v) = source.get(KEY_MAX_PAYLOAD) {
            let mtu = expect_byte(KEY_MAX_PAYLOAD, v)?;
            if mtu == 0 {
                return Err(Error::InvalidParameter(format!(
                    "{} must be non-zero",
                    KEY_MAX_PAYLOAD
                )));
            }
            cfg.max_payload = mtu as usize;
        }
        if let Some(v) = source.get(KEY_WRITE_RETRY_COUNT) {
            cfg.write_retries = expect_byte(KEY_WRITE_RETRY_COUNT, v)? as u32;
        }
        if let Some(v) = source.get(KEY_HANDSHAKE_ATTEMPTS) {
            cfg.handshake_attempts = expect_byte(KEY_HANDSHAKE_ATTEMPTS, v)? as u32;
        }
        if let Some(v) = source.get(KEY_WINDOW_TIMEOUT_MS) {
            cfg.window_timeout_ms = expect_millis(KEY_WINDOW_TIMEOUT_MS, v)?;
        }
        if let Some(v) = source.get(KEY_RESPONSE_TIMEOUT_MS) {
            cfg.response_timeout_ms = expect_millis(KEY_RESPONSE_TIMEOUT_MS, v)?;
        }
        if let Some(v) = source.get(KEY_TRANSCEIVE_TIMEOUT_MS) {
            cfg.transceive_timeout_ms = expect_millis(KEY_TRANSCEIVE_TIMEOUT_MS, v)?;
        }
        if let Some(v) = source.get(KEY_TDA_ENABLED) {
            cfg.tda_enabled = expect_byte(KEY_TDA_ENABLED, v)? != 0;
        }

        Ok(cfg)
    }

    /// Window wait as a `Duration`.
    pub fn window_timeout(&self) -> Duration {
        ms(self.window_timeout_ms)
    }

    /// Response wait as a `Duration`.
    pub fn response_timeout(&self) -> Duration {
        ms(self.response_timeout_ms)
    }

    /// Notification wait as a `Duration`.
    pub fn notification_timeout(&self) -> Duration {
        ms(self.notification_timeout_ms)
    }

    /// APDU wait as a `Duration`.
    pub fn transceive_timeout(&self) -> Duration {
        ms(self.transceive_timeout_ms)
    }

    /// Power-cycle off time as a `Duration`.
    pub fn power_cycle_delay(&self) -> Duration {
        ms(self.power_cycle_delay_ms)
    }

    /// Contact slots are usable on this build and hardware variant.
    pub fn tda_supported(&self) -> bool {
        cfg!(feature = "tda") && self.tda_enabled
    }
}

fn expect_byte(key: &str, value: TunableValue) -> Result<u8> {
    match value {
        TunableValue::Byte(b) => Ok(b),
        other => Err(mistyped(key, "byte", &other)),
    }
}

fn expect_str(key: &str, value: TunableValue) -> Result<String> {
    match value {
        TunableValue::Str(s) => Ok(s),
        other => Err(mistyped(key, "string", &other)),
    }
}

/// Millisecond values are stored as big-endian arrays of 1, 2 or 4 bytes;
/// a plain byte is accepted too.
fn expect_millis(key: &str, value: TunableValue) -> Result<u64> {
    match value {
        TunableValue::Byte(b) => Ok(b as u64),
        TunableValue::Array(bytes) if matches!(bytes.len(), 1 | 2 | 4) => {
            Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
        }
        other => Err(mistyped(key, "1/2/4-byte array", &other)),
    }
}

fn mistyped(key: &str, wanted: &str, got: &TunableValue) -> Error {
    Error::InvalidParameter(format!("{}: expected {}, got {:?}", key, wanted, got))
}
