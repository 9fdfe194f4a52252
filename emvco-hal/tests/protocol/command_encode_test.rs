#[path = "../common/mod.rs"]
mod common;

use emvco_hal::constants::*;
use emvco_hal::protocol::Command;
use emvco_hal::{ChannelId, NciVersion, PollMask, SlotId};

fn wire(cmd: &Command) -> Vec<u8> {
    cmd.to_packet().to_frame().expect("single frame")
}

#[test]
fn handshake_commands_match_fixtures() {
    let reset = Command::CoreReset {
        reset_type: RESET_TYPE_KEEP_CONFIG,
    };
    assert_eq!(wire(&reset), common::fixtures::core_reset_cmd());

    let v2 = NciVersion::new(NCI_VERSION_2_0);
    let v1 = NciVersion::new(NCI_VERSION_1_0);
    assert_eq!(
        wire(&Command::CoreInit { version: v2 }),
        common::fixtures::core_init_cmd_v2()
    );
    assert_eq!(
        wire(&Command::CoreInit { version: v1 }),
        common::fixtures::core_init_cmd_v1()
    );
}

#[test]
fn discovery_command_lists_each_technology() {
    let cmd = Command::RfDiscover {
        mask: PollMask::new(PollMask::A | PollMask::B),
    };
    assert_eq!(wire(&cmd), common::fixtures::rf_discover_ab());

    let all = Command::RfDiscover {
        mask: PollMask::new(0x0F),
    };
    let p = all.encode();
    assert_eq!(p[0], 4);
    assert_eq!(&p[1..], &[0x00, 0x01, 0x01, 0x01, 0x02, 0x01, 0x74, 0x01]);
}

#[test]
fn slot_commands_layout() {
    let slot = SlotId::new(0x20);
    assert_eq!(
        wire(&Command::CoreConnCreate {
            slot,
            protocol: RF_PROTOCOL_ISO_DEP
        }),
        vec![0x20, 0x04, 0x06, 0x03, 0x01, 0x01, 0x02, 0x20, 0x04]
    );
    assert_eq!(
        wire(&Command::CoreConnClose {
            channel: ChannelId::new(0x02)
        }),
        vec![0x20, 0x05, 0x01, 0x02]
    );
    assert_eq!(
        wire(&Command::NfceeModeSet { slot, enable: true }),
        vec![0x22, 0x01, 0x02, 0x20, 0x01]
    );
    assert_eq!(
        wire(&Command::NfceeDiscover {
            version: NciVersion::new(NCI_VERSION_1_0)
        }),
        vec![0x22, 0x00, 0x01, 0x01]
    );
    assert_eq!(
        wire(&Command::RfDeactivate {
            kind: DEACTIVATE_TYPE_IDLE
        }),
        vec![0x21, 0x06, 0x01, 0x00]
    );
}
