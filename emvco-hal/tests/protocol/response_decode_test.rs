#[path = "../common/mod.rs"]
mod common;

use emvco_hal::protocol::responses::{
    decode_conn_create_response, decode_init_response, decode_nfcee_info,
    decode_reset_notification, decode_reset_response,
};
use emvco_hal::protocol::{Notification, Packet, expect_response};
use emvco_hal::{ChannelId, Error, SlotStatus};

fn payload(frame: Vec<u8>) -> Vec<u8> {
    Packet::from_frame(&frame).expect("fixture frame").payload
}

#[test]
fn v2_reset_carries_version_in_notification() {
    let rsp = decode_reset_response(&payload(common::fixtures::reset_rsp_v2())).unwrap();
    assert_eq!(rsp.version, None);

    let ntf = decode_reset_notification(&payload(common::fixtures::reset_ntf_v2())).unwrap();
    assert!(ntf.version.is_v2());
    assert_eq!(ntf.manufacturer_id, 0x04);
    assert_eq!(ntf.manufacturer_info, vec![0x01, 0x02, 0x03, 0x04]);
}

#[test]
fn init_response_features() {
    let init = decode_init_response(&payload(common::fixtures::init_rsp())).unwrap();
    assert_eq!(init.features, [0x1E, 0x03, 0x00, 0x00]);
    assert_eq!(init.params, vec![0x04, 0xFF]);
}

#[test]
fn failing_status_is_controller_status() {
    assert!(matches!(
        decode_conn_create_response(&[0x03]),
        Err(Error::ControllerStatus(0x03))
    ));
    let ok = decode_conn_create_response(&[0x00, 0xFD, 0x01, 0x02]).unwrap();
    assert_eq!(ok.channel, ChannelId::new(0x02));
    assert_eq!(ok.max_payload, 0xFD);
}

#[test]
fn nfcee_announcement_decodes() {
    let slot = decode_nfcee_info(&common::fixtures::nfcee_info_payload()).unwrap();
    assert_eq!(slot.status, SlotStatus::Enabled);
    assert_eq!(slot.protocols, vec![0x04]);
    assert_eq!(slot.card_info.len(), 1);
    assert!(decode_nfcee_info(&[0x20, 0x00, 0x03, 0x04]).is_err());
}

#[test]
fn response_opcode_must_match() {
    let rsp = Packet::from_frame(&common::fixtures::init_rsp()).unwrap();
    assert!(expect_response(&rsp, 0x00, 0x01).is_ok());
    match expect_response(&rsp, 0x01, 0x03) {
        Err(Error::UnexpectedResponse { expected, actual }) => {
            assert_eq!(expected, 0x0103);
            assert_eq!(actual, 0x0001);
        }
        other => panic!("expected UnexpectedResponse, got {:?}", other),
    }
}

#[test]
fn link_loss_notifications_decode() {
    let p = Packet::from_frame(&common::fixtures::rf_link_loss_ntf()).unwrap();
    match Notification::decode(&p).unwrap() {
        Some(Notification::Deactivate(d)) => assert!(d.is_link_loss()),
        other => panic!("unexpected: {:?}", other),
    }
    let reset = Packet::from_frame(&common::fixtures::unsolicited_reset_ntf()).unwrap();
    assert!(matches!(
        Notification::decode(&reset).unwrap(),
        Some(Notification::CoreReset(_))
    ));
    let proprietary = Packet::notification(0x0F, 0x01, vec![]);
    assert_eq!(Notification::decode(&proprietary).unwrap(), None);
}
