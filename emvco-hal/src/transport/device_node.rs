// emvco-hal-rs/emvco-hal/src/transport/device_node.rs

//! Linux character-device link.
//!
//! The controller driver exposes a `/dev` node: plain `read`/`write` move
//! frames, `ioctl` drives the power line. Reads are bounded with `poll`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, info};

use crate::transport::traits::Link;
use crate::types::PowerState;
use crate::utils::lock;
use crate::{Error, Result};

/// ioctl request and argument values of the kernel driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoctlMap {
    /// Power request number.
    pub set_power: libc::c_ulong,
    /// Argument for off.
    pub power_off: libc::c_long,
    /// Argument for on.
    pub power_on: libc::c_long,
    /// Argument for standby.
    pub power_standby: libc::c_long,
    /// Request toggling the session indicator, when the driver has one.
    pub indicator: Option<libc::c_ulong>,
}

impl Default for IoctlMap {
    fn default() -> Self {
        // _IOW(0xE9, 0x01, long)
        Self {
            set_power: 0x4008_E901,
            power_off: 0,
            power_on: 1,
            power_standby: 3,
            indicator: None,
        }
    }
}

/// [`Link`] over a kernel character device.
pub struct DeviceNodeLink {
    path: String,
    ioctls: IoctlMap,
    // Reads and writes use separate handles onto the same descriptor so the
    // read loop never blocks a writer.
    reader: Mutex<Option<File>>,
    writer: Mutex<Option<File>>,
}

impl DeviceNodeLink {
    /// Link to `path` with the default ioctl numbers.
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_ioctls(path, IoctlMap::default())
    }

    /// Link to `path` with driver-specific ioctl numbers.
    pub fn with_ioctls(path: impl Into<String>, ioctls: IoctlMap) -> Self {
        Self {
            path: path.into(),
            ioctls,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    /// Device path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn ioctl(&self, request: libc::c_ulong, arg: libc::c_long) -> Result<()> {
        let guard = lock(&self.writer);
        let file = guard.as_ref().ok_or(Error::NotInitialized)?;
        // SAFETY: the descriptor is open for the lifetime of `guard` and the
        // driver takes the argument by value.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), request as _, arg) };
        if rc < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Link for DeviceNodeLink {
    fn open(&self) -> Result<()> {
        let mut writer = lock(&self.writer);
        if writer.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let reader = file.try_clone()?;
        *lock(&self.reader) = Some(reader);
        *writer = Some(file);
        info!("opened {}", self.path);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        lock(&self.writer).take();
        lock(&self.reader).take();
        info!("closed {}", self.path);
        Ok(())
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let mut guard = lock(&self.reader);
        let file = guard.as_mut().ok_or(Error::NotInitialized)?;

        let mut pfd = libc::pollfd {
            fd: file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        // SAFETY: `pfd` is a valid pollfd and the count is 1.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(Error::Io(err));
        }
        if rc == 0 {
            return Ok(0);
        }
        if pfd.revents & (libc::POLLERR | libc::POLLHUP) != 0 {
            return Err(Error::Link(format!("{}: poll revents {:#x}", self.path, pfd.revents)));
        }
        Ok(file.read(buf)?)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        let mut guard = lock(&self.writer);
        let file = guard.as_mut().ok_or(Error::NotInitialized)?;
        let n = file.write(data)?;
        if n != data.len() {
            return Err(Error::Link(format!("short write {}/{}", n, data.len())));
        }
        Ok(n)
    }

    fn set_power(&self, state: PowerState) -> Result<()> {
        let arg = match state {
            PowerState::Off => self.ioctls.power_off,
            PowerState::On => self.ioctls.power_on,
            PowerState::Standby => self.ioctls.power_standby,
        };
        debug!("set power {} via ioctl", state);
        self.ioctl(self.ioctls.set_power, arg)
    }

    fn set_indicator(&self, on: bool) -> Result<()> {
        match self.ioctls.indicator {
            Some(request) => self.ioctl(request, on as libc::c_long),
            None => Ok(()),
        }
    }
}
