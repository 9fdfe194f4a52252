// emvco-hal-rs/emvco-hal/src/protocol/responses/core_group.rs

use crate::protocol::parser::{byte_at, ensure_len, expect_status_ok, length_prefixed_at, slice_at};
use crate::types::{ChannelId, NciVersion};
use crate::Result;

/// CORE_RESET_RSP. 1.x controllers put the version in the response, 2.x
/// controllers announce it in the following notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetResponse {
    /// Present on 1.x controllers.
    pub version: Option<NciVersion>,
}

/// Decode CORE_RESET_RSP, failing on a non-OK status.
pub fn decode_reset_response(data: &[u8]) -> Result<ResetResponse> {
    expect_status_ok(data)?;
    let version = data.get(1).copied().map(NciVersion::new);
    Ok(ResetResponse { version })
}

/// CORE_RESET_NTF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetNotification {
    /// Why the controller reset.
    pub trigger: u8,
    /// Whether the configuration was kept.
    pub config_status: u8,
    /// Announced version.
    pub version: NciVersion,
    /// Vendor id.
    pub manufacturer_id: u8,
    /// Vendor-specific bytes, usually firmware.
    pub manufacturer_info: Vec<u8>,
}

/// Decode CORE_RESET_NTF.
pub fn decode_reset_notification(data: &[u8]) -> Result<ResetNotification> {
    ensure_len(data, 2)?;
    let trigger = data[0];
    let config_status = data[1];
    // A synthesized or minimal notification stops after the trigger bytes.
    if data.len() == 2 {
        return Ok(ResetNotification {
            trigger,
            config_status,
            version: NciVersion::new(0),
            manufacturer_id: 0,
            manufacturer_info: Vec::new(),
        });
    }
    let version = NciVersion::new(byte_at(data, 2)?);
    let manufacturer_id = byte_at(data, 3)?;
    let (info, _) = length_prefixed_at(data, 4)?;
    Ok(ResetNotification {
        trigger,
        config_status,
        version,
        manufacturer_id,
        manufacturer_info: info.to_vec(),
    })
}

/// CORE_INIT_RSP: status, 4 feature bytes, then version-specific
/// parameters kept raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitResponse {
    /// Feature bytes.
    pub features: [u8; 4],
    /// Remaining parameters, undecoded.
    pub params: Vec<u8>,
}

/// Decode CORE_INIT_RSP, failing on a non-OK status.
pub fn decode_init_response(data: &[u8]) -> Result<InitResponse> {
    expect_status_ok(data)?;
    let f = slice_at(data, 1, 4)?;
    Ok(InitResponse {
        features: [f[0], f[1], f[2], f[3]],
        params: data[5..].to_vec(),
    })
}

/// CORE_CONN_CREATE_RSP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnCreateResponse {
    /// Largest data payload per frame.
    pub max_payload: u8,
    /// Initial credits; 0xFF disables flow control.
    pub credits: u8,
    /// Connection id assigned by the controller.
    pub channel: ChannelId,
}

/// Decode CORE_CONN_CREATE_RSP.
pub fn decode_conn_create_response(data: &[u8]) -> Result<ConnCreateResponse> {
    expect_status_ok(data)?;
    ensure_len(data, 4)?;
    Ok(ConnCreateResponse {
        max_payload: data[1],
        credits: data[2],
        channel: ChannelId::new(data[3]),
    })
}

/// CORE_CONN_CREDITS_NTF: credits granted per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditsNotification {
    /// `(connection, credits)` pairs.
    pub entries: Vec<(ChannelId, u8)>,
}

impl CreditsNotification {
    /// Credits granted to `channel`, zero if absent.
    pub fn credits_for(&self, channel: ChannelId) -> u8 {
        self.entries
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, n)| *n)
            .sum()
    }
}

/// Decode CORE_CONN_CREDITS_NTF.
pub fn decode_credits_notification(data: &[u8]) -> Result<CreditsNotification> {
    let count = byte_at(data, 0)? as usize;
    let pairs = slice_at(data, 1, count * 2)?;
    let entries = pairs
        .chunks_exact(2)
        .map(|p| (ChannelId::new(p[0]), p[1]))
        .collect();
    Ok(CreditsNotification { entries })
}
