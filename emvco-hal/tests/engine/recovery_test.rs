#[path = "../common/mod.rs"]
mod common;

use std::thread;
use std::time::Duration;

use common::fixtures;
use common::helpers::{WAIT, fast_config, opened, rig_with};
use emvco_hal::constants::*;
use emvco_hal::prelude::*;
use emvco_hal::test_support::SimConfig;
use serial_test::serial;

fn is_reset_ntf(p: &Packet) -> bool {
    p.is(MessageType::Notification, GID_CORE, OID_CORE_RESET)
}

#[test]
#[serial]
fn exhausted_write_retries_power_cycle_and_report_reset() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    let power_before = r.link.power_log().len();

    r.link.fail_next_writes(r.engine.config().write_retries as usize);
    assert!(matches!(
        r.engine.write(&fixtures::frame("2F 01 00")),
        Err(Error::Link(_))
    ));

    let ntf = r
        .callbacks
        .wait_for_data(is_reset_ntf, WAIT)
        .expect("synthesized reset forwarded");
    assert_eq!(ntf.payload[0], RESET_TRIGGER_UNRECOVERABLE);
    assert_eq!(
        r.link.power_log()[power_before..],
        [PowerState::Off, PowerState::On]
    );

    // the window was released with the failed write
    assert_eq!(r.engine.write(&fixtures::frame("2F 01 00"))?, 3);
    Ok(())
}

#[test]
#[serial]
fn unsolicited_reset_fails_pending_command() -> anyhow::Result<()> {
    let config = HalConfig {
        response_timeout_ms: 3000,
        ..fast_config()
    };
    let r = rig_with(
        config,
        SimConfig {
            ignore: vec![(GID_RF, OID_RF_DISCOVER)],
            ..SimConfig::default()
        },
    )?;
    r.open()?;

    let link = r.link.clone();
    let pusher = thread::spawn(move || {
        if link.wait_for_writes(3, WAIT) {
            thread::sleep(Duration::from_millis(50));
            link.push_frame(&fixtures::unsolicited_reset_ntf());
        }
    });

    let res = r.engine.set_mode(0x03, true);
    pusher.join().expect("pusher thread");
    assert!(matches!(res, Err(Error::Link(_))));
    assert_eq!(
        r.callbacks.wait_for(HalEvent::PollingStartFailed, WAIT),
        Some(Status::LinkError)
    );
    assert!(r.callbacks.wait_for_data(is_reset_ntf, WAIT).is_some());
    Ok(())
}

#[test]
#[serial]
fn rf_link_loss_is_forwarded() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    r.link.push_frame(&fixtures::rf_link_loss_ntf());
    let ntf = r
        .callbacks
        .wait_for_data(
            |p| p.is(MessageType::Notification, GID_RF, OID_RF_DEACTIVATE),
            WAIT,
        )
        .expect("link loss forwarded");
    assert_eq!(ntf.payload, vec![0x00, DEACTIVATE_REASON_RF_LINK_LOSS]);
    assert!(r.engine.is_open());
    Ok(())
}

#[test]
#[serial]
fn reset_during_handshake_is_not_link_loss() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    // the v2 reset notification was consumed by the handshake, not forwarded
    assert!(!r.callbacks.data().iter().any(is_reset_ntf));
    assert!(r.engine.controller_info().is_some());
    Ok(())
}
