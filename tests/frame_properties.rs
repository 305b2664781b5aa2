//! Property tests for the frame and packet codecs.
//!
//! The codec invariants under test:
//! - any byte string the decoder accepts re-encodes to exactly itself
//! - whatever the encoder produces, the decoder accepts
//! - packet serialization round-trips
//! - the scanner converges when no new data arrives

use homeline::frame::{self, FrameScanner};
use homeline::packet::Packet;
use proptest::prelude::*;

/// Bytes allowed inside a frame payload: NUL padding, digits, uppercase.
fn payload_byte() -> impl Strategy<Value = u8> {
    prop_oneof![Just(0u8), b'0'..=b'9', b'A'..=b'Z']
}

fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(payload_byte(), 6..64)
}

/// Even-length uppercase hex `dat` region.
fn dat() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(b"0123456789ABCDEF".to_vec()), 0..32).prop_map(
        |mut bytes| {
            if bytes.len() % 2 == 1 {
                bytes.pop();
            }
            String::from_utf8(bytes).unwrap()
        },
    )
}

proptest! {
    #[test]
    fn prop_encode_always_decodes(payload in payload()) {
        let frame_bytes = frame::encode(&payload).unwrap();
        prop_assert_eq!(frame::decode(&frame_bytes).unwrap(), payload);
    }

    #[test]
    fn prop_decode_then_encode_is_identity(payload in payload()) {
        let frame_bytes = frame::encode(&payload).unwrap();
        let decoded = frame::decode(&frame_bytes).unwrap();
        prop_assert_eq!(frame::encode(&decoded).unwrap(), frame_bytes);
    }

    /// Arbitrary byte strings that happen to decode must re-encode exactly.
    #[test]
    fn prop_any_decodable_bytes_reencode_exactly(
        bytes in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        if let Ok(payload) = frame::decode(&bytes) {
            prop_assert_eq!(frame::encode(&payload).unwrap(), bytes);
        }
    }

    #[test]
    fn prop_packet_roundtrip(
        dst in any::<u8>(),
        src in any::<u8>(),
        command in any::<u8>(),
        dat in dat(),
    ) {
        let packet = Packet::new(dst, src, command, dat);
        let decoded = Packet::from_payload(&packet.to_payload()).unwrap();
        prop_assert_eq!(decoded, packet);
    }

    /// With no new input the scanner reaches a fixed point and stays there.
    #[test]
    fn prop_scanner_converges_without_new_data(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 0..8),
    ) {
        let mut scanner = FrameScanner::new();
        for chunk in &chunks {
            scanner.extend(chunk);
        }
        while scanner.next_payload().is_some() {}
        for _ in 0..3 {
            prop_assert!(scanner.next_payload().is_none());
        }
    }

    /// Leading line noise never hides the frame that follows it.
    #[test]
    fn prop_scanner_finds_frame_after_garbage(
        garbage in prop::collection::vec(
            any::<u8>().prop_filter("not SOF", |b| *b != 0x02),
            0..16,
        ),
        payload in payload(),
    ) {
        let mut scanner = FrameScanner::new();
        scanner.extend(&garbage);
        scanner.extend(&frame::encode(&payload).unwrap());
        let first = scanner.next_payload().unwrap().unwrap();
        prop_assert_eq!(first, payload);
    }
}
