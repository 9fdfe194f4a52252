// emvco-hal-rs/emvco-hal/src/transport/traits.rs

use std::thread;
use std::time::Duration;

use crate::Result;
use crate::types::PowerState;

/// Link trait abstracts the physical channel away from framing and
/// command logic.
///
/// Methods take `&self`: the read loop and writers share one link, so
/// implementations synchronize internally.
pub trait Link: Send + Sync {
    /// Open the physical channel.
    fn open(&self) -> Result<()>;

    /// Close the channel; pending reads return promptly.
    fn close(&self) -> Result<()>;

    /// Read up to `buf.len()` bytes, waiting at most `timeout`. `Ok(0)`
    /// means nothing arrived in time.
    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Write one complete frame.
    fn write(&self, data: &[u8]) -> Result<usize>;

    /// Drive the controller's power line.
    fn set_power(&self, state: PowerState) -> Result<()>;

    /// Hardware reset: power off, wait `delay`, power on.
    fn power_cycle(&self, delay: Duration) -> Result<()> {
        self.set_power(PowerState::Off)?;
        thread::sleep(delay);
        self.set_power(PowerState::On)
    }

    /// Visual indicator of an active payment session. Links without one
    /// ignore the call.
    fn set_indicator(&self, _on: bool) -> Result<()> {
        Ok(())
    }
}
