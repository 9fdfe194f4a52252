// emvco-hal-rs/emvco-hal/src/lib.rs

//! emvco-hal
//!
//! Transport, command synchronisation and contact-slot engine for NFC
//! controllers that switch between an NFC-forum persona and an EMVCo
//! payment persona.
#![warn(missing_docs)]

/// Engine tunables and the key/value config source.
pub mod config;
/// NCI wire constants.
pub mod constants;
/// The [`Engine`](engine::Engine) context.
pub mod engine;
/// Error type and status taxonomy.
pub mod error;
/// Upstream events and the deferred event queue.
pub mod events;
/// Segmentation and reassembly.
pub mod fragment;
/// CORE_RESET / CORE_INIT handshake.
pub mod handshake;
/// Common re-exports.
pub mod prelude;
/// Persona arbitration between the NFC stack and payments.
pub mod profile;
/// NCI frames, packets, commands and responses.
pub mod protocol;
/// Command/response synchronization.
pub mod sync;
/// Contact-card slots.
pub mod tda;
/// Simulated controller and recorders for tests.
pub mod test_support;
/// Links and the framer.
pub mod transport;
/// Domain newtypes and enums.
pub mod types;
/// Small shared helpers.
pub mod utils;

// Re-export common types at crate root so `crate::Error`, `crate::Result`,
// and the newtypes in `types` are available for consumers and for
// convenient `prelude` re-exports.
pub use crate::error::*;
pub use crate::types::*;

pub use prelude::*;
