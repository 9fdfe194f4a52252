// emvco-hal-rs/emvco-hal/src/events/callbacks.rs

use std::fmt;

use log::{debug, info, warn};

use crate::Status;
use crate::protocol::Packet;

/// Events delivered to the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HalEvent {
    /// Channel open and handshake done.
    OpenComplete,
    /// Opening the channel failed.
    OpenError,
    /// Channel closed.
    CloseComplete,
    /// Persona switch under way.
    PollingStarting,
    /// Discovery running with the requested mask.
    PollingStarted,
    /// Discovery could not be started.
    PollingStartFailed,
    /// A card with a protocol the payment persona cannot serve was activated.
    UnsupportedCard,
    /// A command written through the raw path got no response in time.
    CommandTimeout,
}

impl fmt::Display for HalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HalEvent::OpenComplete => "OPEN_COMPLETE",
            HalEvent::OpenError => "OPEN_ERROR",
            HalEvent::CloseComplete => "CLOSE_COMPLETE",
            HalEvent::PollingStarting => "POLLING_STARTING",
            HalEvent::PollingStarted => "POLLING_STARTED",
            HalEvent::PollingStartFailed => "POLLING_START_FAILED",
            HalEvent::UnsupportedCard => "UNSUPPORTED_CARD",
            HalEvent::CommandTimeout => "COMMAND_TIMEOUT",
        };
        f.write_str(s)
    }
}

/// Observer for upstream events and inbound packets.
///
/// Every call runs on the event-queue consumer thread, one at a time.
pub trait HalCallbacks: Send + Sync {
    /// Lifecycle or error event with its status.
    fn on_event(&self, event: HalEvent, status: Status);

    /// Inbound packet not consumed by the engine itself.
    fn on_data(&self, packet: &Packet);
}

/// Discards everything.
pub struct NullCallbacks;

impl HalCallbacks for NullCallbacks {
    fn on_event(&self, _event: HalEvent, _status: Status) {}

    fn on_data(&self, _packet: &Packet) {}
}

/// Logs events and packets through the `log` facade.
pub struct LoggingCallbacks;

impl HalCallbacks for LoggingCallbacks {
    fn on_event(&self, event: HalEvent, status: Status) {
        if status.is_success() {
            info!("event {}", event);
        } else {
            warn!("event {} ({})", event, status);
        }
    }

    fn on_data(&self, packet: &Packet) {
        debug!("data {}", packet);
    }
}

/// Adapter turning a pair of closures into [`HalCallbacks`].
pub struct FnCallbacks<E, D> {
    on_event: E,
    on_data: D,
}

impl<E, D> FnCallbacks<E, D>
where
    E: Fn(HalEvent, Status) + Send + Sync,
    D: Fn(&Packet) + Send + Sync,
{
    /// Wrap the two closures.
    pub fn new(on_event: E, on_data: D) -> Self {
        Self { on_event, on_data }
    }
}

impl<E, D> HalCallbacks for FnCallbacks<E, D>
where
    E: Fn(HalEvent, Status) + Send + Sync,
    D: Fn(&Packet) + Send + Sync,
{
    fn on_event(&self, event: HalEvent, status: Status) {
        (self.on_event)(event, status)
    }

    fn on_data(&self, packet: &Packet) {
        (self.on_data)(packet)
    }
}
