// emvco-hal-rs/emvco-hal/src/transport/mod.rs

/// Character-device link.
#[cfg(feature = "device-node")]
pub mod device_node;
/// Reader thread and serialized writes over a link.
pub mod framer;
/// In-memory link for tests.
pub mod mock;
/// The [`Link`] trait.
pub mod traits;

#[cfg(feature = "device-node")]
pub use device_node::DeviceNodeLink;
pub use framer::{FrameSink, Framer, FramerConfig};
pub use mock::MockLink;
pub use traits::Link;
