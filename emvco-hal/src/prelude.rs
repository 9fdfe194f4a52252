// emvco-hal-rs/emvco-hal/src/prelude.rs

pub use crate::config::{ConfigSource, HalConfig, MapSource, TunableValue};
pub use crate::engine::Engine;
pub use crate::events::{FnCallbacks, HalCallbacks, HalEvent, LoggingCallbacks, NullCallbacks};
pub use crate::profile::{ModeOutcome, NfcSubsystem, NullSubsystem};
pub use crate::protocol::{Command, MessageType, Packet};
pub use crate::tda::SlotState;
pub use crate::transport::{Link, MockLink};
pub use crate::{
    ChannelId, ControllerInfo, Error, NciVersion, NfcState, PollMask, PowerState, Profile, Result,
    SlotId, SlotStatus, Status, TdaSlot,
};

// Re-export small utilities for convenience
pub use crate::utils::{bytes_to_hex, bytes_to_hex_spaced, ms, parse_hex};
