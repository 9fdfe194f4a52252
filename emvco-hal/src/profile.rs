// emvco-hal-rs/emvco-hal/src/profile.rs

//! Profile/mode arbitration between the NFC-forum stack and the payment
//! persona.

use std::sync::{Arc, Mutex};

use log::{error, info, warn};

use crate::events::HalEvent;
use crate::types::{NfcState, PollMask, Profile};
use crate::utils::lock;
use crate::{Result, Status};

/// The cooperating NFC-forum subsystem sharing the controller.
pub trait NfcSubsystem: Send + Sync {
    /// Stop using the link (polling off, stack down) so the payment
    /// persona can take it.
    fn relinquish(&self) -> Result<()>;

    /// The payment persona is done; the subsystem may take the link back.
    fn reclaim(&self) -> Result<()>;
}

/// Subsystem stand-in for devices without an NFC-forum stack.
pub struct NullSubsystem;

impl NfcSubsystem for NullSubsystem {
    fn relinquish(&self) -> Result<()> {
        Ok(())
    }

    fn reclaim(&self) -> Result<()> {
        Ok(())
    }
}

/// What the arbitrator drives while switching.
pub trait ProfileChannel {
    /// True while the payment channel is open.
    fn is_open(&self) -> bool;
    /// Open the payment channel, handshake included.
    fn open_channel(&self) -> Result<()>;
    /// RF discovery with `mask`.
    fn start_discovery(&self, mask: PollMask) -> Result<()>;
    /// Back to RF idle.
    fn stop_discovery(&self) -> Result<()>;
    /// De-init the contact-slot layer, indicator off, close the channel.
    fn shutdown_channel(&self) -> Result<()>;
    /// Report upstream through the event queue.
    fn post_event(&self, event: HalEvent, status: Status);
}

/// Result of a mode request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeOutcome {
    /// Discovery is running.
    PollingStarted,
    /// Payment persona stopped and the link handed back.
    Stopped,
    /// Stop requested while not in the payment persona.
    NothingToStop,
}

#[derive(Debug, Default)]
struct ProfileState {
    profile: Profile,
    pending_switch: bool,
    last_mask: Option<PollMask>,
    polling: bool,
}

/// Decides which persona owns the controller and serializes switches.
pub struct ProfileArbitrator {
    state: Mutex<ProfileState>,
    // held for a whole transition
    transition: Mutex<()>,
    subsystem: Arc<dyn NfcSubsystem>,
}

impl ProfileArbitrator {
    /// Arbitrator starting in `Unknown`.
    pub fn new(subsystem: Arc<dyn NfcSubsystem>) -> Self {
        Self {
            state: Mutex::new(ProfileState::default()),
            transition: Mutex::new(()),
            subsystem,
        }
    }

    /// Current persona.
    pub fn profile(&self) -> Profile {
        lock(&self.state).profile
    }

    /// True between POLLING_STARTING and the switch outcome.
    pub fn is_switching(&self) -> bool {
        lock(&self.state).pending_switch
    }

    /// Mask of the last accepted start request.
    pub fn last_mask(&self) -> Option<PollMask> {
        lock(&self.state).last_mask
    }

    /// True while discovery runs.
    pub fn is_polling(&self) -> bool {
        lock(&self.state).polling
    }

    /// Start polling with `mask` or stop the payment persona.
    pub fn request_mode(&self, chan: &dyn ProfileChannel, mask: u8, start: bool) -> Result<ModeOutcome> {
        let _transition = lock(&self.transition);
        if start {
            self.start(chan, mask)
        } else {
            self.stop(chan)
        }
    }

    fn start(&self, chan: &dyn ProfileChannel, bits: u8) -> Result<ModeOutcome> {
        let mask = match PollMask::validate(bits) {
            Ok(m) => m,
            Err(e) => {
                warn!("rejecting poll mask {:#04x}", bits);
                chan.post_event(HalEvent::PollingStartFailed, e.status());
                return Err(e);
            }
        };

        let (current, polling) = {
            let mut st = lock(&self.state);
            st.pending_switch = true;
            st.last_mask = Some(mask);
            (st.profile, st.polling)
        };

        let result = if current == Profile::Emvco && chan.is_open() {
            self.restart_discovery(chan, mask, polling)
        } else {
            self.switch_to_emvco(chan, mask, current)
        };

        let mut st = lock(&self.state);
        st.pending_switch = false;
        match result {
            Ok(()) => {
                st.polling = true;
                drop(st);
                info!("polling started ({})", mask);
                chan.post_event(HalEvent::PollingStarted, Status::Success);
                Ok(ModeOutcome::PollingStarted)
            }
            Err(e) => {
                st.polling = false;
                drop(st);
                error!("polling start failed: {}", e);
                chan.post_event(HalEvent::PollingStartFailed, e.status());
                Err(e)
            }
        }
    }

    fn restart_discovery(&self, chan: &dyn ProfileChannel, mask: PollMask, polling: bool) -> Result<()> {
        if polling {
            chan.stop_discovery()?;
            lock(&self.state).polling = false;
        }
        chan.start_discovery(mask)
    }

    fn switch_to_emvco(&self, chan: &dyn ProfileChannel, mask: PollMask, from: Profile) -> Result<()> {
        info!("switching profile {} -> {}", from, Profile::Emvco);
        chan.post_event(HalEvent::PollingStarting, Status::Success);
        self.subsystem.relinquish()?;

        if !chan.is_open() {
            if let Err(e) = chan.open_channel() {
                self.give_back();
                return Err(e);
            }
        }
        lock(&self.state).profile = Profile::Emvco;
        chan.start_discovery(mask)
    }

    fn stop(&self, chan: &dyn ProfileChannel) -> Result<ModeOutcome> {
        if !chan.is_open() {
            info!("stop requested with no open channel");
            return Ok(ModeOutcome::NothingToStop);
        }
        lock(&self.state).pending_switch = true;

        if self.is_polling() {
            if let Err(e) = chan.stop_discovery() {
                warn!("deactivate before shutdown failed: {}", e);
            }
        }
        let result = chan.shutdown_channel();
        self.on_link_closed();
        self.give_back();
        result.map(|_| ModeOutcome::Stopped)
    }

    fn give_back(&self) {
        if let Err(e) = self.subsystem.reclaim() {
            error!("subsystem failed to reclaim the link: {}", e);
        }
    }

    /// The channel was opened directly by the control plane.
    pub fn on_channel_opened(&self) {
        let mut st = lock(&self.state);
        st.profile = Profile::Emvco;
        st.polling = false;
    }

    /// Reset to `Unknown`; called whenever the link closes.
    pub fn on_link_closed(&self) {
        let mut st = lock(&self.state);
        st.profile = Profile::Unknown;
        st.polling = false;
        st.pending_switch = false;
    }

    /// The NFC-forum subsystem reports that it took (`On`) or released
    /// (`Off`) the link.
    pub fn nfc_state_changed(&self, state: NfcState) {
        let mut st = lock(&self.state);
        match state {
            NfcState::On if st.profile != Profile::Emvco => st.profile = Profile::NfcForum,
            NfcState::On => warn!("NFC subsystem reports ON while payment persona owns the link"),
            NfcState::Off if st.profile == Profile::NfcForum => st.profile = Profile::Unknown,
            NfcState::Off => {}
        }
    }
}
