// emvco-hal-rs/emvco-hal/src/protocol/mod.rs

/// Command encoders.
pub mod commands;
/// Wire header and frame codec.
pub mod frame;
/// Logical messages.
pub mod packet;
/// Bounds-checked payload readers.
pub mod parser;
/// Response and notification decoders.
pub mod responses;

pub use commands::Command;
pub use frame::{Frame, Header, MessageType};
pub use packet::Packet;
pub use responses::{Notification, expect_response};
