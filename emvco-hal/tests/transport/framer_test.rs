#[path = "../common/mod.rs"]
mod common;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::fixtures;
use common::helpers::{WAIT, fast_config};
use emvco_hal::transport::{Framer, FramerConfig, Link, MockLink};
use serial_test::serial;

fn started(link: Arc<MockLink>) -> anyhow::Result<(Framer, mpsc::Receiver<Vec<u8>>)> {
    let framer = Framer::new(link, FramerConfig::from(&fast_config()));
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    framer.start(Arc::new(move |frame| {
        let _ = tx.lock().map(|t| t.send(frame));
    }))?;
    Ok((framer, rx))
}

#[test]
#[serial]
fn frames_split_across_reads_are_delivered_whole() -> anyhow::Result<()> {
    let link = Arc::new(MockLink::new());
    let (framer, rx) = started(link.clone())?;

    let ntf = fixtures::reset_ntf_v2();
    link.push_frame(&ntf[..2]);
    std::thread::sleep(Duration::from_millis(30));
    link.push_frame(&ntf[2..7]);
    std::thread::sleep(Duration::from_millis(30));
    link.push_frame(&ntf[7..]);

    assert_eq!(rx.recv_timeout(WAIT)?, ntf);
    framer.stop()?;
    Ok(())
}

#[test]
#[serial]
fn back_to_back_frames_keep_their_order() -> anyhow::Result<()> {
    let link = Arc::new(MockLink::new());
    let (framer, rx) = started(link.clone())?;

    let mut burst = fixtures::reset_rsp_v2();
    burst.extend(fixtures::reset_ntf_v2());
    burst.extend(fixtures::credits_ntf(1));
    link.push_frame(&burst);

    assert_eq!(rx.recv_timeout(WAIT)?, fixtures::reset_rsp_v2());
    assert_eq!(rx.recv_timeout(WAIT)?, fixtures::reset_ntf_v2());
    assert_eq!(rx.recv_timeout(WAIT)?, fixtures::credits_ntf(1));
    framer.stop()?;
    Ok(())
}

#[test]
#[serial]
fn frame_with_reserved_type_is_dropped_whole() -> anyhow::Result<()> {
    let link = Arc::new(MockLink::new());
    let (framer, rx) = started(link.clone())?;

    // payload bytes would read as a CORE_CONN_CREDITS_NTF header
    link.push_frame(&[0x80, 0x00, 0x03, 0x60, 0x06, 0x00]);
    link.push_frame(&fixtures::reset_rsp_v2());

    assert_eq!(rx.recv_timeout(WAIT)?, fixtures::reset_rsp_v2());
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    framer.stop()?;
    Ok(())
}

#[test]
#[serial]
fn read_failure_mid_payload_keeps_the_stream_aligned() -> anyhow::Result<()> {
    let link = Arc::new(MockLink::new());
    let (framer, rx) = started(link.clone())?;

    let ntf = fixtures::reset_ntf_v2();
    link.push_frame(&ntf[..5]);
    std::thread::sleep(Duration::from_millis(50));
    link.fail_next_reads(1);
    std::thread::sleep(Duration::from_millis(50));
    link.push_frame(&ntf[5..]);
    link.push_frame(&fixtures::credits_ntf(1));

    assert_eq!(rx.recv_timeout(WAIT)?, ntf);
    assert_eq!(rx.recv_timeout(WAIT)?, fixtures::credits_ntf(1));
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    framer.stop()?;
    Ok(())
}

#[test]
#[serial]
fn writes_are_checked_against_mtu() -> anyhow::Result<()> {
    let link = Arc::new(MockLink::new());
    let (framer, _rx) = started(link.clone())?;

    assert_eq!(framer.submit_write(&fixtures::core_reset_cmd())?, 4);
    assert!(framer.submit_write(&[0x20, 0x00]).is_err());
    let mut too_long = vec![0x2F, 0x01, 0xFF];
    too_long.extend(vec![0u8; 256]);
    assert!(framer.submit_write(&too_long).is_err());
    assert_eq!(link.written(), vec![fixtures::core_reset_cmd()]);
    framer.stop()?;
    Ok(())
}

#[test]
#[serial]
fn stop_closes_the_link_and_is_idempotent() -> anyhow::Result<()> {
    let link = Arc::new(MockLink::new());
    let (framer, _rx) = started(link.clone())?;
    assert!(link.is_open());
    assert!(framer.is_running());

    framer.stop()?;
    framer.stop()?;
    assert!(!link.is_open());
    assert!(matches!(
        framer.submit_write(&fixtures::core_reset_cmd()),
        Err(emvco_hal::Error::NotInitialized)
    ));
    Ok(())
}

#[test]
#[serial]
fn mock_link_reads_honor_timeout() -> anyhow::Result<()> {
    let link = MockLink::new();
    link.open()?;
    let mut buf = [0u8; 8];
    assert_eq!(link.read(&mut buf, Duration::from_millis(20))?, 0);
    link.push_frame(&[0x01, 0x02]);
    assert_eq!(link.read(&mut buf, Duration::from_millis(20))?, 2);
    Ok(())
}
