#[path = "../common/mod.rs"]
mod common;

use common::fixtures;
use common::helpers::{WAIT, opened, rig};
use emvco_hal::constants::*;
use emvco_hal::prelude::*;
use emvco_hal::test_support::{RecordingCallbacks, SimConfig};
use serial_test::serial;

#[test]
#[serial]
fn open_runs_reset_init_handshake() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    assert_eq!(r.callbacks.wait_for(HalEvent::OpenComplete, WAIT), Some(Status::Success));

    let written = r.link.written();
    assert_eq!(written[0], fixtures::core_reset_cmd());
    assert_eq!(written[1], fixtures::core_init_cmd_v2());

    let info = r.engine.controller_info().expect("controller info after open");
    assert!(info.version.is_v2());
    assert_eq!(info.manufacturer_id, Some(0x04));
    assert_eq!(info.manufacturer_info, vec![0x01, 0x02, 0x03, 0x04]);
    assert_eq!(info.features, [0x1E, 0x03, 0x00, 0x00]);
    assert_eq!(r.engine.profile(), Profile::Emvco);
    Ok(())
}

#[test]
#[serial]
fn v1_controller_reports_version_in_response() -> anyhow::Result<()> {
    let r = opened(SimConfig {
        version: NciVersion::new(NCI_VERSION_1_0),
        ..SimConfig::default()
    })?;
    assert_eq!(r.link.written()[1], fixtures::core_init_cmd_v1());
    let info = r.engine.controller_info().expect("controller info after open");
    assert_eq!(info.version.to_string(), "1.0");
    assert_eq!(info.manufacturer_id, None);
    Ok(())
}

#[test]
#[serial]
fn second_open_is_rejected() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    assert!(matches!(
        r.engine.open(r.callbacks.clone()),
        Err(Error::AlreadyInitialized)
    ));
    assert_eq!(r.link.open_count(), 1);
    assert_eq!(r.sim.commands(GID_CORE, OID_CORE_RESET), 1);
    Ok(())
}

#[test]
#[serial]
fn handshake_gives_up_after_three_attempts() -> anyhow::Result<()> {
    let r = rig(SimConfig {
        answer_reset: false,
        ..SimConfig::default()
    })?;
    assert!(matches!(r.open(), Err(Error::Timeout)));

    assert_eq!(r.sim.commands(GID_CORE, OID_CORE_RESET), 3);
    assert_eq!(r.sim.commands(GID_CORE, OID_CORE_INIT), 0);
    assert_eq!(
        r.link.power_log(),
        vec![PowerState::Off, PowerState::On, PowerState::Off, PowerState::On]
    );
    assert_eq!(r.callbacks.wait_for(HalEvent::OpenError, WAIT), Some(Status::Timeout));
    assert!(!r.engine.is_open());
    assert!(!r.link.is_open());
    assert!(r.engine.controller_info().is_none());
    Ok(())
}

#[test]
#[serial]
fn link_open_failure_reports_open_error() -> anyhow::Result<()> {
    let r = rig(SimConfig::default())?;
    r.link.fail_open(true);
    assert!(matches!(r.open(), Err(Error::Link(_))));
    assert_eq!(r.callbacks.wait_for(HalEvent::OpenError, WAIT), Some(Status::LinkError));
    assert!(r.link.written().is_empty());
    Ok(())
}

#[test]
#[serial]
fn close_reports_complete_and_forgets_profile() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    r.engine.close(false)?;

    assert_eq!(r.callbacks.wait_for(HalEvent::CloseComplete, WAIT), Some(Status::Success));
    assert!(!r.engine.is_open());
    assert!(!r.link.is_open());
    assert_eq!(r.engine.profile(), Profile::Unknown);
    assert_eq!(r.link.indicator_log().last(), Some(&false));
    assert!(r.subsystem.calls().iter().any(|(what, _)| *what == "reclaim"));
    Ok(())
}

#[test]
#[serial]
fn reopen_after_shutdown_uses_new_callbacks() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    r.engine.close(true)?;
    assert!(r.callbacks.wait_for(HalEvent::CloseComplete, WAIT).is_some());

    let fresh = RecordingCallbacks::new();
    r.engine.open(fresh.clone())?;
    assert_eq!(fresh.wait_for(HalEvent::OpenComplete, WAIT), Some(Status::Success));
    assert_eq!(r.link.open_count(), 2);
    assert_eq!(
        r.callbacks
            .events()
            .iter()
            .filter(|(e, _)| *e == HalEvent::OpenComplete)
            .count(),
        1
    );
    Ok(())
}
