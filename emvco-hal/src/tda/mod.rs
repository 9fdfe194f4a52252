// emvco-hal-rs/emvco-hal/src/tda/mod.rs

//! Contact-card slots (TDA) multiplexed over the controller link.

pub mod manager;
/// Slot states and their edges.
pub mod state;

pub use manager::{TdaConfig, TdaManager};
pub use state::SlotState;
