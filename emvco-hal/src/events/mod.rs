// emvco-hal-rs/emvco-hal/src/events/mod.rs

//! Upstream events, the callback traits that receive them and the
//! deferred-call queue that delivers them.

/// Callback traits and adapters.
pub mod callbacks;
pub mod queue;

pub use callbacks::{FnCallbacks, HalCallbacks, HalEvent, LoggingCallbacks, NullCallbacks};
pub use queue::{EventQueue, QueueItem, QueuePoster};
