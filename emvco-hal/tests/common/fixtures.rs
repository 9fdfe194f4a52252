// fixtures.rs: commonly used wire frames

use emvco_hal::protocol::Packet;

/// Decode a hex fixture; spaces are ignored.
pub fn frame(s: &str) -> Vec<u8> {
    hex::decode(s.replace(' ', "")).expect("valid hex fixture")
}

pub fn core_reset_cmd() -> Vec<u8> {
    frame("20 00 01 00")
}

pub fn core_init_cmd_v2() -> Vec<u8> {
    frame("20 01 02 00 00")
}

pub fn core_init_cmd_v1() -> Vec<u8> {
    frame("20 01 00")
}

pub fn reset_rsp_v2() -> Vec<u8> {
    frame("40 00 01 00")
}

/// Trigger 0x02, version 2.0, manufacturer 0x04, four info bytes.
pub fn reset_ntf_v2() -> Vec<u8> {
    frame("60 00 09 02 00 20 04 04 01 02 03 04")
}

pub fn init_rsp() -> Vec<u8> {
    frame("40 01 07 00 1E 03 00 00 04 FF")
}

/// RF discovery for NFC-A and NFC-B passive poll.
pub fn rf_discover_ab() -> Vec<u8> {
    frame("21 03 05 02 00 01 01 01")
}

pub fn credits_ntf(conn: u8) -> Vec<u8> {
    vec![0x60, 0x06, 0x03, 0x01, conn, 0x01]
}

pub fn nfcee_info_payload() -> Vec<u8> {
    frame("20 00 01 04 01 A0 02 3B 8F 01")
}

/// CORE_RESET_NTF a controller sends after resetting on its own.
pub fn unsolicited_reset_ntf() -> Vec<u8> {
    frame("60 00 02 00 00")
}

pub fn rf_link_loss_ntf() -> Vec<u8> {
    frame("61 06 02 00 02")
}

pub fn select_apdu() -> Vec<u8> {
    frame("00 A4 04 00 07 A0 00 00 00 04 10 10 00")
}

pub fn proprietary_cmd(oid: u8) -> Packet {
    Packet::command(0x0F, oid, vec![])
}
