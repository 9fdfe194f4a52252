use emvco_hal::Error;
use emvco_hal::fragment::{Reassembler, segment};
use emvco_hal::protocol::Packet;

#[test]
fn overflow_drops_the_partial_message() {
    let frames = segment(&Packet::data(1, vec![0x5A; 40]), 16).unwrap();
    let mut r = Reassembler::new(24);

    assert!(r.push(&frames[0]).unwrap().is_none());
    match r.push(&frames[1]) {
        Err(Error::ReassemblyOverflow { needed, capacity }) => {
            assert_eq!(needed, 32);
            assert_eq!(capacity, 24);
        }
        other => panic!("expected overflow, got {:?}", other),
    }
    assert!(r.is_empty());
    assert!(!r.is_chained());

    // closing segment of the dropped message is swallowed
    assert_eq!(r.push(&frames[2]).unwrap(), None);
    assert!(!r.is_discarding());

    let next = Packet::data(1, vec![0x11; 4]);
    assert_eq!(r.push(&next.to_frame().unwrap()).unwrap(), Some(next));
}

#[test]
fn no_part_of_an_oversized_message_is_delivered() {
    let frames = segment(&Packet::data(1, vec![0xC3; 48]), 16).unwrap();
    assert_eq!(frames.len(), 3);
    let mut r = Reassembler::new(24);

    let delivered: Vec<Packet> = frames
        .iter()
        .filter_map(|f| r.push(f).ok().flatten())
        .collect();
    assert!(delivered.is_empty(), "leaked {:?}", delivered);
}

#[test]
fn long_oversized_chain_is_swallowed_to_its_end() {
    let frames = segment(&Packet::data(2, vec![0x07; 100]), 10).unwrap();
    let mut r = Reassembler::new(24);

    let mut errors = 0;
    for f in &frames {
        match r.push(f) {
            Ok(None) => {}
            Ok(Some(p)) => panic!("leaked {}", p),
            Err(_) => errors += 1,
        }
    }
    assert_eq!(errors, 1);
    assert!(!r.is_discarding());
}

#[test]
fn reassembler_recovers_after_overflow() {
    let big = segment(&Packet::data(1, vec![0x01; 60]), 20).unwrap();
    let small = Packet::data(1, vec![0x02; 30]);

    let mut r = Reassembler::new(32);
    for f in &big {
        let _ = r.push(f);
    }

    let mut out = None;
    for f in segment(&small, 20).unwrap() {
        out = r.push(&f).unwrap();
    }
    assert_eq!(out, Some(small));
}

#[test]
fn exact_capacity_fits() {
    let p = Packet::data(4, vec![0x44; 32]);
    let mut r = Reassembler::new(32);
    let mut out = None;
    for f in segment(&p, 10).unwrap() {
        out = r.push(&f).unwrap();
    }
    assert_eq!(out, Some(p));
}
