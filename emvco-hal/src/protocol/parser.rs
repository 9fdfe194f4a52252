// emvco-hal-rs/emvco-hal/src/protocol/parser.rs

use crate::constants::STATUS_OK;
use crate::{Error, Result};

/// Ensure the slice has at least `min` bytes.
pub fn ensure_len(data: &[u8], min: usize) -> Result<()> {
    if data.len() < min {
        return Err(Error::InvalidLength {
            expected: min,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Read a single byte at `idx` with bounds checking.
pub fn byte_at(data: &[u8], idx: usize) -> Result<u8> {
    ensure_len(data, idx + 1)?;
    Ok(data[idx])
}

/// Return a subslice with bounds checking.
pub fn slice_at(data: &[u8], idx: usize, len: usize) -> Result<&[u8]> {
    ensure_len(data, idx + len)?;
    Ok(&data[idx..idx + len])
}

/// Read a length-prefixed block at `idx`; returns the block and the index
/// just past it.
pub fn length_prefixed_at(data: &[u8], idx: usize) -> Result<(&[u8], usize)> {
    let len = byte_at(data, idx)? as usize;
    let block = slice_at(data, idx + 1, len)?;
    Ok((block, idx + 1 + len))
}

/// Ensure the first byte (status) is `STATUS_OK`. Returns
/// `ControllerStatus` carrying the reported code otherwise.
pub fn expect_status_ok(data: &[u8]) -> Result<()> {
    match byte_at(data, 0)? {
        STATUS_OK => Ok(()),
        status => Err(Error::ControllerStatus(status)),
    }
}
