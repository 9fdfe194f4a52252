#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::thread;

use common::fixtures;
use common::helpers::{WAIT, opened};
use emvco_hal::constants::*;
use emvco_hal::prelude::*;
use emvco_hal::test_support::SimConfig;
use serial_test::serial;

fn is_proprietary_response(oid: u8) -> impl Fn(&Packet) -> bool {
    move |p| p.is(MessageType::Response, GID_PROPRIETARY, oid)
}

#[test]
#[serial]
fn raw_command_response_goes_upstream() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    let n = r.engine.write(&fixtures::frame("2F 01 00"))?;
    assert_eq!(n, 3);
    let rsp = r
        .callbacks
        .wait_for_data(is_proprietary_response(0x01), WAIT)
        .expect("response forwarded");
    assert_eq!(rsp.payload, vec![STATUS_OK]);
    Ok(())
}

#[test]
#[serial]
fn malformed_raw_write_is_rejected() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    let before = r.link.written().len();
    assert!(matches!(
        r.engine.write(&fixtures::frame("2F 01 02 00")),
        Err(Error::InvalidLength { .. })
    ));
    assert!(r.engine.write(&[0x2F]).is_err());
    assert_eq!(r.link.written().len(), before);
    Ok(())
}

#[test]
#[serial]
fn pre_segmented_command_is_joined_before_sending() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    let before = r.link.written().len();

    assert_eq!(r.engine.write(&fixtures::frame("3F 01 02 AA BB"))?, 5);
    assert_eq!(r.link.written().len(), before);
    assert_eq!(r.engine.write(&fixtures::frame("2F 01 01 CC"))?, 4);

    let rsp = r
        .callbacks
        .wait_for_data(is_proprietary_response(0x01), WAIT)
        .expect("response forwarded");
    assert_eq!(rsp.payload, vec![STATUS_OK]);

    let commands: Vec<_> = r
        .sim
        .packets()
        .into_iter()
        .filter(|p| p.is(MessageType::Command, GID_PROPRIETARY, 0x01))
        .collect();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].payload, vec![0xAA, 0xBB, 0xCC]);
    assert_eq!(r.link.max_unanswered(), 1);
    Ok(())
}

#[test]
#[serial]
fn raw_write_without_channel_is_rejected() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    r.engine.close(false)?;
    assert!(matches!(
        r.engine.write(&fixtures::frame("3F 01 01 AA")),
        Err(Error::NotInitialized)
    ));
    Ok(())
}

#[test]
#[serial]
fn unanswered_raw_command_times_out_and_frees_window() -> anyhow::Result<()> {
    let r = opened(SimConfig {
        ignore: vec![(GID_PROPRIETARY, 0x02)],
        ..SimConfig::default()
    })?;
    r.engine.write(&fixtures::frame("2F 02 00"))?;
    assert_eq!(
        r.callbacks.wait_for(HalEvent::CommandTimeout, WAIT),
        Some(Status::Timeout)
    );

    r.engine.write(&fixtures::frame("2F 01 00"))?;
    assert!(
        r.callbacks
            .wait_for_data(is_proprietary_response(0x01), WAIT)
            .is_some()
    );
    Ok(())
}

#[test]
#[serial]
fn oversized_packet_is_segmented() -> anyhow::Result<()> {
    let r = opened(SimConfig::default())?;
    r.engine
        .write_packet(&Packet::command(GID_PROPRIETARY, 0x03, vec![0x5A; 300]))?;

    let frames: Vec<_> = r
        .link
        .written()
        .into_iter()
        .filter(|f| f[0] & GID_MASK == GID_PROPRIETARY)
        .collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(&frames[0][..3], &[0x3F, 0x03, 0xFF]);
    assert_eq!(&frames[1][..3], &[0x2F, 0x03, 0x2D]);

    let received = r.sim.packets();
    let cmd = received
        .iter()
        .find(|p| p.is(MessageType::Command, GID_PROPRIETARY, 0x03))
        .expect("controller reassembled the command");
    assert_eq!(cmd.payload.len(), 300);
    Ok(())
}

#[test]
#[serial]
fn concurrent_raw_writes_keep_one_command_in_flight() -> anyhow::Result<()> {
    let r = Arc::new(opened(SimConfig::default())?);
    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            let r = Arc::clone(&r);
            thread::spawn(move || r.engine.write(&[0x2F, 0x10 + i, 0x00]))
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().expect("writer thread")?, 3);
    }
    for i in 0..4u8 {
        assert!(
            r.callbacks
                .wait_for_data(is_proprietary_response(0x10 + i), WAIT)
                .is_some()
        );
    }
    assert_eq!(r.link.max_unanswered(), 1);
    Ok(())
}
