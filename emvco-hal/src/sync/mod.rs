// emvco-hal-rs/emvco-hal/src/sync/mod.rs

//! Command/response synchronization: write window, pending command,
//! notification expectations and the raw-write watchdog.

pub mod command;
pub mod expect;
/// Deadline thread for raw writes.
pub mod watchdog;
/// The write window.
pub mod window;

pub use command::{CommandSync, FrameWriter, Origin, SyncConfig, is_link_loss};
pub use expect::{Expectation, Expectations, Filter};
pub use watchdog::Watchdog;
pub use window::WriteWindow;

use std::sync::Arc;

use crate::Result;
use crate::fragment::segment;
use crate::protocol::{Command, Packet, expect_response};
use crate::types::ChannelId;

/// Everything a caller needs to talk to the controller within one session.
#[derive(Clone)]
pub struct Exchange {
    sync: Arc<CommandSync>,
    writer: Arc<dyn FrameWriter>,
    expectations: Arc<Expectations>,
}

impl Exchange {
    /// Facade over `sync`, writing through `writer`.
    pub fn new(sync: Arc<CommandSync>, writer: Arc<dyn FrameWriter>) -> Self {
        Self {
            sync,
            writer,
            expectations: Arc::new(Expectations::new()),
        }
    }

    /// Shared synchronizer.
    pub fn sync(&self) -> &Arc<CommandSync> {
        &self.sync
    }

    /// Offer an inbound packet to the pending command, then to registered
    /// expectations. Returns `true` when it was consumed.
    pub fn route(&self, packet: &Packet) -> bool {
        self.sync.on_packet(packet) || self.expectations.offer(packet)
    }

    /// Register an expectation before sending the command that triggers it.
    pub fn expect(&self, filter: Filter) -> Expectation {
        self.expectations.register(filter)
    }

    /// Send with the configured number of retransmissions.
    pub fn send_command(&self, packet: &Packet) -> Result<Packet> {
        let retransmits = self.sync.config().retransmits;
        self.sync.send_command(&*self.writer, packet, retransmits)
    }

    /// Send without retransmission.
    pub fn send_command_once(&self, packet: &Packet) -> Result<Packet> {
        self.sync.send_command(&*self.writer, packet, 0)
    }

    /// Send `cmd` and require a successful response.
    pub fn execute(&self, cmd: &Command) -> Result<Packet> {
        let rsp = self.send_command(&cmd.to_packet())?;
        expect_response(&rsp, cmd.gid(), cmd.oid())?;
        Ok(rsp)
    }

    /// Send `payload` on `conn` in segments of at most `max_payload` bytes.
    /// With flow control each segment waits for its credit.
    pub fn send_data(
        &self,
        conn: ChannelId,
        payload: &[u8],
        max_payload: usize,
        flow_control: bool,
    ) -> Result<()> {
        let mtu = max_payload.min(self.writer.mtu()).max(1);
        let frames = segment(&Packet::data(conn.as_u8(), payload.to_vec()), mtu)?;
        for frame in &frames {
            self.sync
                .send_data_frame(&*self.writer, conn, frame, flow_control)?;
        }
        Ok(())
    }

    /// Raw control-plane write; the watchdog owns the deadline.
    pub fn submit_external(&self, packet: &Packet) -> Result<()> {
        self.sync.submit_external(&*self.writer, packet)
    }

    /// Fail the pending operation and wake every waiter.
    pub fn abort(&self) {
        self.sync.abort();
        self.expectations.fail_all();
    }

    /// Fail registered expectations only; the pending command has its own
    /// link-loss handling.
    pub fn fail_waiters(&self) {
        self.expectations.fail_all();
    }
}
