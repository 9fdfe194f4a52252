// emvco-hal-rs/emvco-hal/src/handshake.rs

//! Reset/init handshake run whenever the payment channel opens.
//!
//! `CORE_RESET -> RESET_RSP -> [RESET_NTF] -> CORE_INIT -> INIT_RSP`. The
//! whole sequence is retried with a power cycle in between; the number of
//! attempts is bounded by configuration.

use std::time::Duration;

use log::{error, info, warn};

use crate::Result;
use crate::config::HalConfig;
use crate::constants::{GID_CORE, OID_CORE_INIT, OID_CORE_RESET, RESET_TYPE_KEEP_CONFIG};
use crate::protocol::responses::{decode_init_response, decode_reset_notification, decode_reset_response};
use crate::protocol::{Command, expect_response};
use crate::sync::{Exchange, Filter};
use crate::transport::Link;
use crate::types::ControllerInfo;
use crate::utils::Retry;

/// Retry policy of the reset/init exchange.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Attempts before giving up.
    pub attempts: u32,
    /// Off time between attempts.
    pub power_cycle_delay: Duration,
    /// Wait for CORE_RESET_NTF on 2.x controllers.
    pub notification_timeout: Duration,
}

impl From<&HalConfig> for HandshakeConfig {
    fn from(cfg: &HalConfig) -> Self {
        Self {
            attempts: cfg.handshake_attempts,
            power_cycle_delay: cfg.power_cycle_delay(),
            notification_timeout: cfg.notification_timeout(),
        }
    }
}

/// Run the handshake, power-cycling the controller between failed attempts.
pub fn run(exchange: &Exchange, link: &dyn Link, cfg: &HandshakeConfig) -> Result<ControllerInfo> {
    let retry = Retry::new(cfg.attempts);
    let result = retry.run(
        |attempt| {
            info!("reset/init handshake, attempt {}/{}", attempt, retry.attempts());
            attempt_once(exchange, cfg)
        },
        |attempt, e| {
            warn!("handshake attempt {} failed: {}; power cycling", attempt, e);
            if let Err(pe) = link.power_cycle(cfg.power_cycle_delay) {
                error!("power cycle failed: {}", pe);
            }
        },
    );
    match &result {
        Ok(info) => info!(
            "controller ready: version {}, firmware [{}]",
            info.version,
            info.firmware_hex()
        ),
        Err(e) => error!("handshake failed after {} attempts: {}", retry.attempts(), e),
    }
    result
}

fn attempt_once(exchange: &Exchange, cfg: &HandshakeConfig) -> Result<ControllerInfo> {
    exchange.sync().set_resetting(true);
    let result = reset_and_init(exchange, cfg);
    exchange.sync().set_resetting(false);
    result
}

fn reset_and_init(exchange: &Exchange, cfg: &HandshakeConfig) -> Result<ControllerInfo> {
    let reset_ntf = exchange.expect(Filter::Notification {
        gid: GID_CORE,
        oid: OID_CORE_RESET,
    });
    let reset = Command::CoreReset {
        reset_type: RESET_TYPE_KEEP_CONFIG,
    };
    let rsp = exchange.send_command_once(&reset.to_packet())?;
    expect_response(&rsp, GID_CORE, OID_CORE_RESET)?;
    let reset_rsp = decode_reset_response(&rsp.payload)?;

    let (version, manufacturer_id, manufacturer_info) = match reset_rsp.version {
        Some(version) => (version, None, Vec::new()),
        None => {
            let ntf = reset_ntf.wait_one(cfg.notification_timeout)?;
            let ntf = decode_reset_notification(&ntf.payload)?;
            (ntf.version, Some(ntf.manufacturer_id), ntf.manufacturer_info)
        }
    };
    drop(reset_ntf);

    let rsp = exchange.send_command_once(&Command::CoreInit { version }.to_packet())?;
    expect_response(&rsp, GID_CORE, OID_CORE_INIT)?;
    let init = decode_init_response(&rsp.payload)?;

    Ok(ControllerInfo {
        version,
        manufacturer_id,
        manufacturer_info,
        features: init.features,
    })
}
