#[path = "../common/mod.rs"]
mod common;

use common::fixtures;
use common::helpers::{WAIT, opened, rig};
use emvco_hal::constants::*;
use emvco_hal::prelude::*;
use emvco_hal::test_support::SimConfig;
use serial_test::serial;

#[test]
#[serial]
fn start_from_unknown_relinquishes_before_touching_the_link() -> anyhow::Result<()> {
    let r = rig(SimConfig::default())?;
    assert_eq!(r.engine.profile(), Profile::Unknown);

    assert_eq!(r.engine.set_mode(0x03, true)?, ModeOutcome::PollingStarted);
    assert_eq!(r.callbacks.wait_for(HalEvent::PollingStarted, WAIT), Some(Status::Success));

    assert_eq!(r.subsystem.calls().first(), Some(&("relinquish", 0)));
    let order: Vec<HalEvent> = r.callbacks.events().iter().map(|(e, _)| *e).collect();
    assert_eq!(
        order,
        vec![
            HalEvent::PollingStarting,
            HalEvent::OpenComplete,
            HalEvent::PollingStarted
        ]
    );
    assert!(r.link.written().contains(&fixtures::rf_discover_ab()));
    assert_eq!(r.engine.profile(), Profile::Emvco);
    assert_eq!(r.link.indicator_log(), vec![true]);
    Ok(())
}

#[test]
#[serial]
fn mask_outside_allow_list_has_no_side_effects() -> anyhow::Result<()> {
    let r = rig(SimConfig::default())?;
    assert!(matches!(
        r.engine.set_mode(0x05, true),
        Err(Error::InvalidParameter(_))
    ));
    assert_eq!(
        r.callbacks.wait_for(HalEvent::PollingStartFailed, WAIT),
        Some(Status::InvalidParameter)
    );
    assert_eq!(r.link.open_count(), 0);
    assert!(r.link.written().is_empty());
    assert!(r.subsystem.calls().is_empty());
    assert_eq!(r.engine.profile(), Profile::Unknown);
    Ok(())
}

#[test]
#[serial]
fn restart_while_polling_deactivates_first() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    r.engine.set_mode(0x03, true)?;
    r.link.clear_written();

    r.engine.set_mode(0x0B, true)?;
    let headers: Vec<[u8; 2]> = r
        .link
        .written()
        .iter()
        .map(|f| [f[0], f[1]])
        .collect();
    assert_eq!(headers, vec![[0x21, OID_RF_DEACTIVATE], [0x21, OID_RF_DISCOVER]]);
    assert_eq!(r.engine.profile(), Profile::Emvco);
    // already in the payment persona: no second relinquish
    assert!(r.subsystem.calls().is_empty());
    Ok(())
}

#[test]
#[serial]
fn stop_closes_channel_and_reclaims() -> anyhow::Result<()> {
    let r = rig(SimConfig::default())?;
    r.engine.set_mode(0x01, true)?;

    assert_eq!(r.engine.set_mode(0, false)?, ModeOutcome::Stopped);
    assert_eq!(r.callbacks.wait_for(HalEvent::CloseComplete, WAIT), Some(Status::Success));
    assert_eq!(r.sim.commands(GID_RF, OID_RF_DEACTIVATE), 1);
    assert_eq!(r.link.indicator_log().last(), Some(&false));
    assert_eq!(
        r.subsystem.calls().iter().map(|(w, _)| *w).collect::<Vec<_>>(),
        vec!["relinquish", "reclaim"]
    );
    assert_eq!(r.engine.profile(), Profile::Unknown);
    assert!(!r.engine.is_open());
    Ok(())
}

#[test]
#[serial]
fn stop_without_channel_is_a_no_op() -> anyhow::Result<()> {
    let r = rig(SimConfig::default())?;
    assert_eq!(r.engine.set_mode(0, false)?, ModeOutcome::NothingToStop);
    assert!(matches!(r.engine.close(false), Err(Error::NotInitialized)));
    assert!(r.subsystem.calls().is_empty());
    Ok(())
}

#[test]
#[serial]
fn failed_open_during_switch_gives_link_back() -> anyhow::Result<()> {
    let r = rig(SimConfig {
        answer_reset: false,
        ..SimConfig::default()
    })?;
    assert!(r.engine.set_mode(0x03, true).is_err());
    assert_eq!(
        r.callbacks.wait_for(HalEvent::PollingStartFailed, WAIT),
        Some(Status::Timeout)
    );
    assert_eq!(
        r.subsystem.calls().iter().map(|(w, _)| *w).collect::<Vec<_>>(),
        vec!["relinquish", "reclaim"]
    );
    assert_eq!(r.engine.profile(), Profile::Unknown);
    Ok(())
}

#[test]
#[serial]
fn non_iso_dep_card_is_reported_and_forwarded() -> anyhow::Result<()> {
    let r = opened(SimConfig {
        activate_protocol: Some(0x02),
        ..SimConfig::default()
    })?;
    r.engine.set_mode(0x03, true)?;
    assert_eq!(
        r.callbacks.wait_for(HalEvent::UnsupportedCard, WAIT),
        Some(Status::FeatureNotSupported)
    );
    let ntf = r
        .callbacks
        .wait_for_data(
            |p| p.is(MessageType::Notification, GID_RF, OID_RF_INTF_ACTIVATED),
            WAIT,
        )
        .expect("activation forwarded");
    assert_eq!(ntf.payload[2], 0x02);
    Ok(())
}

#[test]
#[serial]
fn iso_dep_card_is_not_flagged() -> anyhow::Result<()> {
    let r = opened(SimConfig {
        activate_protocol: Some(RF_PROTOCOL_ISO_DEP),
        ..SimConfig::default()
    })?;
    r.engine.set_mode(0x03, true)?;
    assert!(
        r.callbacks
            .wait_for_data(
                |p| p.is(MessageType::Notification, GID_RF, OID_RF_INTF_ACTIVATED),
                WAIT,
            )
            .is_some()
    );
    assert!(
        !r.callbacks
            .events()
            .iter()
            .any(|(e, _)| *e == HalEvent::UnsupportedCard)
    );
    Ok(())
}
