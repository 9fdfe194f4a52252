// emvco-hal-rs/emvco-hal/src/tda/state.rs

use derive_more::Display;

use crate::{Error, Result};

/// Lifecycle of one contact slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SlotState {
    /// Known only by id.
    #[display(fmt = "INIT")]
    Init,
    /// Reported by NFCEE discovery.
    #[display(fmt = "DISCOVERED")]
    Discovered,
    /// Slot powered through NFCEE_MODE_SET.
    #[display(fmt = "MODE_SET_ENABLED")]
    ModeSetEnabled,
    /// Logical connection open; APDUs may flow.
    #[display(fmt = "CORE_CONN_CREATED")]
    CoreConnCreated,
    /// Connection closed; the slot may still be enabled.
    #[display(fmt = "CORE_CONN_CLOSED")]
    CoreConnClosed,
}

impl SlotState {
    /// Every state, in lifecycle order.
    pub const ALL: [SlotState; 5] = [
        SlotState::Init,
        SlotState::Discovered,
        SlotState::ModeSetEnabled,
        SlotState::CoreConnCreated,
        SlotState::CoreConnClosed,
    ];

    /// A logical channel exists.
    pub fn is_open(self) -> bool {
        self == SlotState::CoreConnCreated
    }

    /// The slot is powered from the controller's point of view.
    pub fn is_active(self) -> bool {
        matches!(self, SlotState::ModeSetEnabled | SlotState::CoreConnCreated)
    }

    /// True when `self -> to` is a legal edge.
    pub fn can_transition(self, to: SlotState) -> bool {
        use SlotState::*;
        matches!(
            (self, to),
            (Init, Discovered)
                | (Discovered, Discovered)
                | (Discovered, ModeSetEnabled)
                | (ModeSetEnabled, CoreConnCreated)
                | (ModeSetEnabled, Discovered)
                | (CoreConnCreated, CoreConnClosed)
                // standby resume: mode stayed enabled
                | (CoreConnClosed, CoreConnCreated)
                | (CoreConnClosed, ModeSetEnabled)
                | (CoreConnClosed, Discovered)
        )
    }

    /// Checked move to `to`; illegal edges are a `StateError`.
    pub fn transition(self, to: SlotState) -> Result<SlotState> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(Error::State(format!("slot cannot go {} -> {}", self, to)))
        }
    }
}
