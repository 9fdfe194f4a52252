// emvco-hal-rs/emvco-hal/src/engine.rs

//! The explicit engine context the control plane talks to.
//!
//! An [`Engine`] owns one event queue for its whole lifetime and at most one
//! open session (framer + synchronizer + watchdog) at a time. Inbound
//! frames flow `Link -> Framer -> EventQueue -> Reassembler -> routing ->
//! waiters or callbacks`; every callback runs on the queue's consumer
//! thread.
//!
//! Blocking operations (`close`, `set_mode`, slot operations) wait for
//! frames routed by that same consumer thread, so they must not be called
//! from inside a callback.

use std::sync::{Arc, Mutex, Weak};

use log::{debug, error, info, warn};

use crate::config::HalConfig;
use crate::constants::DEACTIVATE_TYPE_IDLE;
use crate::events::{EventQueue, HalCallbacks, HalEvent, NullCallbacks, QueueItem, QueuePoster};
use crate::fragment::Reassembler;
use crate::handshake::{self, HandshakeConfig};
use crate::profile::{ModeOutcome, NfcSubsystem, ProfileArbitrator, ProfileChannel};
use crate::protocol::{Command, MessageType, Notification, Packet};
use crate::sync::{CommandSync, Exchange, FrameWriter, SyncConfig, Watchdog, is_link_loss};
use crate::tda::{SlotState, TdaConfig, TdaManager};
use crate::transport::{Framer, FramerConfig, Link};
use crate::types::{
    ChannelId, ControllerInfo, NciVersion, NfcState, PollMask, PowerState, Profile, SlotId, TdaSlot,
    is_supported_card_protocol,
};
use crate::utils::lock;
use crate::{Error, Result, Status};

/// One open channel to the controller.
struct Session {
    framer: Arc<Framer>,
    exchange: Exchange,
    watchdog: Watchdog,
}

impl Session {
    fn start(config: &HalConfig, link: Arc<dyn Link>, poster: QueuePoster) -> Result<Self> {
        let framer = Arc::new(Framer::new(link, FramerConfig::from(config)));
        let sync = Arc::new(CommandSync::new(SyncConfig::from(config)));
        let writer: Arc<dyn FrameWriter> = framer.clone();
        let exchange = Exchange::new(Arc::clone(&sync), writer);
        let watchdog = Watchdog::start(sync, poster.clone())?;

        framer.start(Arc::new(move |frame| {
            if let Err(e) = poster.post(QueueItem::Frame(frame)) {
                debug!("inbound frame dropped: {}", e);
            }
        }))?;
        Ok(Self {
            framer,
            exchange,
            watchdog,
        })
    }

    fn shutdown(&self) {
        self.exchange.abort();
        if let Err(e) = self.framer.stop() {
            warn!("closing link failed: {}", e);
        }
        self.watchdog.stop();
    }
}

struct Core {
    config: HalConfig,
    link: Arc<dyn Link>,
    arbitrator: ProfileArbitrator,
    tda: TdaManager,
    callbacks: Mutex<Arc<dyn HalCallbacks>>,
    session: Mutex<Option<Arc<Session>>>,
    controller: Mutex<Option<ControllerInfo>>,
    queue: Mutex<Option<EventQueue>>,
    // touched only by the queue consumer
    reassembler: Mutex<Reassembler>,
    // raw segments written by the control plane, joined before submission
    outbound: Mutex<Reassembler>,
    // serializes channel open/close
    lifecycle: Mutex<()>,
}

impl Core {
    fn callbacks(&self) -> Arc<dyn HalCallbacks> {
        Arc::clone(&lock(&self.callbacks))
    }

    fn poster(&self) -> Result<QueuePoster> {
        lock(&self.queue)
            .as_ref()
            .map(EventQueue::poster)
            .ok_or_else(|| Error::state("event queue stopped"))
    }

    fn post(&self, event: HalEvent, status: Status) {
        let res = match lock(&self.queue).as_ref() {
            Some(q) => q.post(QueueItem::Event(event, status)),
            None => Err(Error::state("event queue stopped")),
        };
        if let Err(e) = res {
            warn!("event {} ({}) not delivered: {}", event, status, e);
        }
    }

    fn session(&self) -> Result<Arc<Session>> {
        lock(&self.session).clone().ok_or(Error::NotInitialized)
    }

    fn exchange(&self) -> Option<Exchange> {
        lock(&self.session).as_ref().map(|s| s.exchange.clone())
    }

    fn version(&self) -> Result<NciVersion> {
        lock(&self.controller)
            .as_ref()
            .map(|c| c.version)
            .ok_or(Error::NotInitialized)
    }

    fn open_session(&self) -> Result<()> {
        let _lifecycle = lock(&self.lifecycle);
        if lock(&self.session).is_some() {
            return Err(Error::AlreadyInitialized);
        }
        info!("opening payment channel on {}", self.config.device_node);
        let poster = self.poster()?;
        lock(&self.reassembler).reset();
        lock(&self.outbound).reset();

        let session = match Session::start(&self.config, Arc::clone(&self.link), poster) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                error!("cannot start transport: {}", e);
                self.post(HalEvent::OpenError, e.status());
                return Err(e);
            }
        };
        // installed before the handshake so responses can be routed
        *lock(&self.session) = Some(Arc::clone(&session));

        let hs = HandshakeConfig::from(&self.config);
        match handshake::run(&session.exchange, &*self.link, &hs) {
            Ok(info) => {
                *lock(&self.controller) = Some(info);
                self.arbitrator.on_channel_opened();
                self.post(HalEvent::OpenComplete, Status::Success);
                Ok(())
            }
            Err(e) => {
                lock(&self.session).take();
                session.shutdown();
                self.post(HalEvent::OpenError, e.status());
                Err(e)
            }
        }
    }

    fn close_session(&self) -> Result<()> {
        let _lifecycle = lock(&self.lifecycle);
        let session = self.session()?;
        self.tda.deinit(Some(&session.exchange));
        if let Err(e) = self.link.set_indicator(false) {
            warn!("indicator off failed: {}", e);
        }

        lock(&self.session).take();
        session.shutdown();
        lock(&self.outbound).reset();
        lock(&self.controller).take();
        self.arbitrator.on_link_closed();
        info!("payment channel closed");
        self.post(HalEvent::CloseComplete, Status::Success);
        Ok(())
    }

    fn handle(&self, item: QueueItem) {
        match item {
            QueueItem::Frame(frame) => self.on_frame(&frame),
            QueueItem::Event(event, status) => self.callbacks().on_event(event, status),
            QueueItem::Call(f) => f(),
            QueueItem::Shutdown => {}
        }
    }

    fn on_frame(&self, frame: &[u8]) {
        let packet = match lock(&self.reassembler).push(frame) {
            Ok(Some(p)) => p,
            Ok(None) => return,
            Err(e) => {
                error!("inbound frame dropped: {}", e);
                return;
            }
        };

        let exchange = self.exchange();
        if exchange.as_ref().is_some_and(|ex| ex.route(&packet)) {
            return;
        }
        if packet.mt == MessageType::Notification {
            self.on_notification(&packet, exchange.as_ref());
        }
        self.callbacks().on_data(&packet);
    }

    fn on_notification(&self, packet: &Packet, exchange: Option<&Exchange>) {
        let resetting = exchange.is_some_and(|ex| ex.sync().is_resetting());
        if is_link_loss(packet, resetting) {
            warn!("controller reports link loss: {}", packet);
            self.tda.invalidate();
            if let Some(ex) = exchange {
                ex.fail_waiters();
            }
            return;
        }
        match Notification::decode(packet) {
            Ok(Some(Notification::IntfActivated(n))) if !is_supported_card_protocol(n.protocol) => {
                warn!("activated card speaks protocol {:#04x}", n.protocol);
                self.callbacks()
                    .on_event(HalEvent::UnsupportedCard, Status::FeatureNotSupported);
            }
            Ok(Some(Notification::GenericError(code))) => {
                warn!("controller generic error {:#04x}", code);
            }
            Ok(_) => {}
            Err(e) => debug!("undecodable notification {}: {}", packet, e),
        }
    }
}

impl ProfileChannel for Core {
    fn is_open(&self) -> bool {
        lock(&self.session).is_some()
    }

    fn open_channel(&self) -> Result<()> {
        self.open_session()
    }

    fn start_discovery(&self, mask: PollMask) -> Result<()> {
        let session = self.session()?;
        session.exchange.execute(&Command::RfDiscover { mask })?;
        if let Err(e) = self.link.set_indicator(true) {
            warn!("indicator on failed: {}", e);
        }
        Ok(())
    }

    fn stop_discovery(&self) -> Result<()> {
        let session = self.session()?;
        session.exchange.execute(&Command::RfDeactivate {
            kind: DEACTIVATE_TYPE_IDLE,
        })?;
        Ok(())
    }

    fn shutdown_channel(&self) -> Result<()> {
        self.close_session()
    }

    fn post_event(&self, event: HalEvent, status: Status) {
        self.post(event, status);
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        if let Some(session) = lock(&self.session).take() {
            session.shutdown();
        }
        if let Some(queue) = lock(&self.queue).take() {
            queue.stop();
        }
    }
}

/// Controller engine: one per physical controller.
pub struct Engine {
    core: Arc<Core>,
}

impl Engine {
    /// Create the engine and start its event queue. The link stays closed
    /// until [`Engine::open`] or [`Engine::set_mode`].
    pub fn new(config: HalConfig, link: Arc<dyn Link>, subsystem: Arc<dyn NfcSubsystem>) -> Result<Self> {
        let tda = TdaManager::new(TdaConfig::from(&config));
        let reassembler = Reassembler::new(config.reassembly_capacity);
        let outbound = Reassembler::new(config.reassembly_capacity);
        let core = Arc::new(Core {
            config,
            link,
            arbitrator: ProfileArbitrator::new(subsystem),
            tda,
            callbacks: Mutex::new(Arc::new(NullCallbacks)),
            session: Mutex::new(None),
            controller: Mutex::new(None),
            queue: Mutex::new(None),
            reassembler: Mutex::new(reassembler),
            outbound: Mutex::new(outbound),
            lifecycle: Mutex::new(()),
        });

        let weak: Weak<Core> = Arc::downgrade(&core);
        let queue = EventQueue::start(move |item| {
            if let Some(core) = weak.upgrade() {
                core.handle(item);
            }
        })?;
        *lock(&core.queue) = Some(queue);
        Ok(Self { core })
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &HalConfig {
        &self.core.config
    }

    /// Register `callbacks` and open the payment channel, handshake
    /// included. Reports OPEN_COMPLETE or OPEN_ERROR.
    pub fn open(&self, callbacks: Arc<dyn HalCallbacks>) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyInitialized);
        }
        self.set_callbacks(callbacks);
        self.core.open_session()
    }

    /// Replace the callbacks without opening anything, e.g. before a
    /// [`Engine::set_mode`] that opens the channel itself.
    pub fn set_callbacks(&self, callbacks: Arc<dyn HalCallbacks>) {
        *lock(&self.core.callbacks) = callbacks;
    }

    /// True while the payment channel is open.
    pub fn is_open(&self) -> bool {
        self.core.is_open()
    }

    /// Raw write of one wire frame from the control plane. Returns the
    /// number of bytes accepted.
    ///
    /// Segments (PBF set) are held until the closing segment of the same
    /// message arrives; the joined packet then takes the write window once.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.core.session()?;
        match lock(&self.core.outbound).push(bytes)? {
            Some(packet) => self.write_packet(&packet)?,
            None => debug!("raw segment of {} bytes held", bytes.len()),
        }
        Ok(bytes.len())
    }

    /// Raw write of a packet of any size; it is segmented to the link MTU.
    pub fn write_packet(&self, packet: &Packet) -> Result<()> {
        self.core.session()?.exchange.submit_external(packet)
    }

    /// Stop polling, close every slot and the channel, and hand the link
    /// back to the NFC subsystem. With `shutdown` the callbacks are
    /// released once CLOSE_COMPLETE was delivered.
    pub fn close(&self, shutdown: bool) -> Result<()> {
        let outcome = self.core.arbitrator.request_mode(&*self.core, 0, false);
        if shutdown {
            let weak = Arc::downgrade(&self.core);
            let release = QueueItem::Call(Box::new(move || {
                if let Some(core) = weak.upgrade() {
                    *lock(&core.callbacks) = Arc::new(NullCallbacks);
                }
            }));
            if let Some(q) = lock(&self.core.queue).as_ref() {
                if let Err(e) = q.post(release) {
                    warn!("cannot release callbacks: {}", e);
                }
            }
        }
        match outcome? {
            ModeOutcome::NothingToStop => Err(Error::NotInitialized),
            _ => Ok(()),
        }
    }

    /// Start polling with `mask` (switching persona when needed) or stop
    /// the payment persona.
    pub fn set_mode(&self, mask: u8, start: bool) -> Result<ModeOutcome> {
        self.core.arbitrator.request_mode(&*self.core, mask, start)
    }

    /// Forward a state report of the NFC-forum subsystem.
    pub fn nfc_state_changed(&self, state: NfcState) {
        self.core.arbitrator.nfc_state_changed(state);
    }

    /// Current persona.
    pub fn profile(&self) -> Profile {
        self.core.arbitrator.profile()
    }

    /// Handshake results of the open channel.
    pub fn controller_info(&self) -> Option<ControllerInfo> {
        lock(&self.core.controller).clone()
    }

    /// Enumerate contact slots.
    pub fn discover_slots(&self) -> Result<Vec<TdaSlot>> {
        let (session, version) = self.slot_context()?;
        self.core.tda.discover(&session.exchange, version)
    }

    /// Open slot `id` and return its logical channel. With `standby`, a
    /// parked slot is resumed without re-enabling it.
    pub fn open_slot(&self, id: SlotId, standby: bool) -> Result<ChannelId> {
        let (session, version) = self.slot_context()?;
        self.core.tda.open(&session.exchange, version, id, standby)
    }

    /// Exchange one APDU on an open slot's channel.
    pub fn transceive_slot(&self, channel: ChannelId, apdu: &[u8]) -> Result<Vec<u8>> {
        let (session, _) = self.slot_context()?;
        self.core.tda.transceive(&session.exchange, channel, apdu)
    }

    /// Close slot `id`; with `standby` it stays enabled for a quick resume.
    pub fn close_slot(&self, id: SlotId, standby: bool) -> Result<()> {
        let (session, version) = self.slot_context()?;
        if self.core.tda.close(&session.exchange, version, id, standby)? {
            debug!("no slot in use, link to standby");
            if let Err(e) = self.core.link.set_power(PowerState::Standby) {
                warn!("standby request failed: {}", e);
            }
        }
        Ok(())
    }

    /// Slot table of the current session.
    pub fn slots(&self) -> Vec<TdaSlot> {
        self.core.tda.slots()
    }

    /// State of slot `id` in the current table.
    pub fn slot_state(&self, id: SlotId) -> Option<SlotState> {
        self.core.tda.state_of(id)
    }

    fn slot_context(&self) -> Result<(Arc<Session>, NciVersion)> {
        if !self.core.tda.is_supported() {
            return Err(Error::FeatureNotSupported);
        }
        let session = self.core.session()?;
        let version = self.core.version()?;
        Ok((session, version))
    }
}
