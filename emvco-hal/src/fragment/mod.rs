// emvco-hal-rs/emvco-hal/src/fragment/mod.rs

//! MTU segmentation of outbound packets and reassembly of inbound chains.

/// Inbound chain reassembly.
pub mod reassembly;
/// Outbound MTU segmentation.
pub mod segment;

pub use reassembly::Reassembler;
pub use segment::segment;
