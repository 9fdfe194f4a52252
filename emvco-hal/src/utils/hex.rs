//! Hex helpers for packet logging and test fixtures.

use std::fmt::Write;

/// Bytes shown by [`frame_dump`] before the output is elided.
pub const DUMP_LIMIT: usize = 64;

/// Lowercase hex, no separators: `&[0xde, 0xad]` -> `"dead"`.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // write! never fails writing to a String
        let _ = write!(&mut s, "{:02x}", b);
    }
    s
}

/// Lowercase hex with one space between bytes: `"de ad"`.
pub fn bytes_to_hex_spaced(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i != 0 {
            s.push(' ');
        }
        let _ = write!(&mut s, "{:02x}", b);
    }
    s
}

/// Render a wire frame as `hdr | payload`, eliding long payloads.
///
/// Example: `[0x20, 0x00, 0x01, 0x00]` -> `"20 00 01 | 00"`
pub fn frame_dump(frame: &[u8]) -> String {
    let split = frame.len().min(crate::constants::HEADER_LEN);
    let (hdr, payload) = frame.split_at(split);
    let mut s = bytes_to_hex_spaced(hdr);
    if !payload.is_empty() {
        s.push_str(" | ");
        let shown = payload.len().min(DUMP_LIMIT);
        s.push_str(&bytes_to_hex_spaced(&payload[..shown]));
        if payload.len() > shown {
            let _ = write!(&mut s, " .. (+{} bytes)", payload.len() - shown);
        }
    }
    s
}

/// Parse a hex string into bytes, ignoring ASCII whitespace.
pub fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = s.bytes().filter(|c| !c.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err("hex string has odd length".to_string());
    }

    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).map_err(|e| e.to_string())?;
            u8::from_str_radix(text, 16).map_err(|e| format!("invalid hex pair '{}': {}", text, e))
        })
        .collect()
}
