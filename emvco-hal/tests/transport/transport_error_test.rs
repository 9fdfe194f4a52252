#[path = "../common/mod.rs"]
mod common;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use common::fixtures;
use common::helpers::{WAIT, fast_config};
use emvco_hal::constants::RESET_TRIGGER_UNRECOVERABLE;
use emvco_hal::transport::{Framer, FramerConfig, MockLink};
use emvco_hal::{Error, HalConfig, PowerState};
use serial_test::serial;

fn started(link: Arc<MockLink>, cfg: &HalConfig) -> anyhow::Result<(Framer, mpsc::Receiver<Vec<u8>>)> {
    let framer = Framer::new(link, FramerConfig::from(cfg));
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    framer.start(Arc::new(move |frame| {
        let _ = tx.lock().map(|t| t.send(frame));
    }))?;
    Ok((framer, rx))
}

#[test]
#[serial]
fn transient_write_failures_are_retried() -> anyhow::Result<()> {
    let link = Arc::new(MockLink::new());
    let (framer, rx) = started(link.clone(), &fast_config())?;

    link.fail_next_writes(2);
    assert_eq!(framer.submit_write(&fixtures::core_reset_cmd())?, 4);
    assert_eq!(link.written().len(), 1);
    assert!(link.power_log().is_empty());
    assert!(rx.try_recv().is_err());
    framer.stop()?;
    Ok(())
}

#[test]
#[serial]
fn persistent_write_failure_power_cycles() -> anyhow::Result<()> {
    let cfg = HalConfig {
        write_retries: 3,
        ..fast_config()
    };
    let link = Arc::new(MockLink::new());
    let (framer, rx) = started(link.clone(), &cfg)?;

    link.fail_next_writes(3);
    assert!(matches!(
        framer.submit_write(&fixtures::core_reset_cmd()),
        Err(Error::Link(_))
    ));
    assert_eq!(link.power_log(), vec![PowerState::Off, PowerState::On]);

    let ntf = rx.recv_timeout(WAIT)?;
    assert_eq!(&ntf[..3], &[0x60, 0x00, 0x02]);
    assert_eq!(ntf[3], RESET_TRIGGER_UNRECOVERABLE);
    framer.stop()?;
    Ok(())
}

#[test]
#[serial]
fn read_errors_do_not_stop_the_reader() -> anyhow::Result<()> {
    let link = Arc::new(MockLink::new());
    let (framer, rx) = started(link.clone(), &fast_config())?;

    link.fail_next_reads(3);
    link.push_frame(&fixtures::init_rsp());
    assert_eq!(rx.recv_timeout(WAIT)?, fixtures::init_rsp());
    assert!(framer.is_running());
    framer.stop()?;
    Ok(())
}

#[test]
#[serial]
fn open_failure_leaves_framer_stopped() {
    let link = Arc::new(MockLink::new());
    link.fail_open(true);
    let framer = Framer::new(link.clone(), FramerConfig::from(&fast_config()));
    assert!(framer.start(Arc::new(|_| {})).is_err());
    assert!(!framer.is_running());
    assert!(!link.is_open());
}
