#[path = "../common/mod.rs"]
mod common;

use emvco_hal::Error;
use emvco_hal::protocol::{Frame, Header, MessageType, Packet};

#[test]
fn reset_notification_fixture_decodes() {
    let frame = common::fixtures::reset_ntf_v2();
    let (header, payload) = Frame::decode(&frame).expect("frame decode");
    assert_eq!(header.mt, MessageType::Notification);
    assert!(!header.pbf);
    assert_eq!((header.gid, header.oid), (0x00, 0x00));
    assert_eq!(payload.len(), 9);
    assert_eq!(payload[2], 0x20);
}

#[test]
fn data_header_carries_connection_id() {
    let h = Header::parse(&[0x13, 0xFF, 0x05]).expect("header");
    assert_eq!(h.mt, MessageType::Data);
    assert!(h.pbf);
    assert_eq!(h.gid, 0x03);
    // reserved byte is not an opcode
    assert_eq!(h.oid, 0x00);
    assert_eq!(h.payload_len(), 5);
}

#[test]
fn packet_frame_round_trip_matches_fixture() {
    let p = Packet::from_frame(&common::fixtures::rf_discover_ab()).expect("decode");
    assert!(p.is(MessageType::Command, 0x01, 0x03));
    assert_eq!(p.payload, vec![0x02, 0x00, 0x01, 0x01, 0x01]);
    assert_eq!(p.to_frame().expect("encode"), common::fixtures::rf_discover_ab());
    assert_eq!(p.opcode(), 0x0103);
}

#[test]
fn length_mismatch_is_invalid_length() {
    let mut frame = common::fixtures::init_rsp();
    frame.push(0x00);
    match Frame::decode(&frame) {
        Err(Error::InvalidLength { expected, actual }) => {
            assert_eq!(expected, 10);
            assert_eq!(actual, 11);
        }
        other => panic!("expected InvalidLength, got {:?}", other),
    }
    assert!(Header::parse(&[0x20, 0x00]).is_err());
}

#[test]
fn segmented_frame_is_not_a_packet() {
    assert!(matches!(
        Packet::from_frame(&[0x3F, 0x01, 0x01, 0xAA]),
        Err(Error::FrameFormat(_))
    ));
}

#[test]
fn oversized_payload_needs_segmenting() {
    let p = Packet::command(0x0F, 0x01, vec![0; 256]);
    assert!(matches!(p.to_frame(), Err(Error::InvalidLength { .. })));
}
