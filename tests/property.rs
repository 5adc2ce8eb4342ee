//! Property-based tests for masking, header codec and write fragmentation.

mod harness;

use harness::MockTransport;
use proptest::prelude::*;
use wscore::protocol::{FrameHead, MAX_HEAD_LEN};
use wscore::{apply_mask, Config, Connection, Error, OpCode, Role};

fn any_opcode() -> impl Strategy<Value = OpCode> {
    prop_oneof![
        Just(OpCode::Continuation),
        Just(OpCode::Text),
        Just(OpCode::Binary),
        Just(OpCode::Close),
        Just(OpCode::Ping),
        Just(OpCode::Pong),
    ]
}

fn any_len() -> impl Strategy<Value = u64> {
    prop_oneof![
        0u64..=200,
        125u64..=70000,
        prop_oneof![Just(65535u64), Just(65536), Just(1 << 31), Just((1 << 32) - 1)],
        65536u64..(1u64 << 40),
    ]
}

proptest! {
    // Masking twice with the same key and offset is the identity.
    #[test]
    fn prop_mask_involution(
        data in prop::collection::vec(any::<u8>(), 0..512),
        key in any::<[u8; 4]>(),
        offset in 0u64..1024,
    ) {
        let mut masked = data.clone();
        apply_mask(&mut masked, key, offset);
        apply_mask(&mut masked, key, offset);
        prop_assert_eq!(masked, data);
    }

    // Masking piecewise with carried offsets equals masking whole.
    #[test]
    fn prop_mask_offset_independence(
        data in prop::collection::vec(any::<u8>(), 1..512),
        key in any::<[u8; 4]>(),
        split_seed in any::<prop::sample::Index>(),
    ) {
        let split = split_seed.index(data.len() + 1);

        let mut whole = data.clone();
        apply_mask(&mut whole, key, 0);

        let mut pieces = data.clone();
        let (head, tail) = pieces.split_at_mut(split);
        apply_mask(head, key, 0);
        apply_mask(tail, key, split as u64);

        prop_assert_eq!(pieces, whole);
    }

    // Header encode/decode reproduces (fin, opcode, len, mask).
    #[test]
    fn prop_head_roundtrip(
        fin in any::<bool>(),
        opcode in any_opcode(),
        payload_len in any_len(),
        mask in prop::option::of(any::<[u8; 4]>()),
    ) {
        let head = FrameHead { fin, opcode, payload_len, mask };
        let mut buf = [0u8; MAX_HEAD_LEN];
        let len = head.encode(&mut buf);

        prop_assert_eq!(len, FrameHead::remainder_len(buf[1]) + 2);
        let decoded = FrameHead::decode([buf[0], buf[1]], &buf[2..len]).unwrap();
        prop_assert_eq!(decoded, head);
    }

    // The decoder rejects every fragmented or oversized control frame.
    #[test]
    fn prop_control_frame_constraints(
        opcode in prop_oneof![Just(OpCode::Close), Just(OpCode::Ping), Just(OpCode::Pong)],
        fin in any::<bool>(),
        payload_len in any_len(),
    ) {
        let head = FrameHead { fin, opcode, payload_len, mask: Some([0; 4]) };
        let result = head.validate(Role::Server);
        if !fin {
            prop_assert!(matches!(result, Err(Error::FragmentedControlFrame)));
        } else if payload_len > 125 {
            prop_assert!(matches!(result, Err(Error::ControlFrameTooLarge(_))));
        } else {
            prop_assert!(result.is_ok());
        }
    }

    // The encoder refuses oversized control payloads outright.
    #[test]
    fn prop_oversized_ping_never_hits_the_wire(extra in 1usize..1000) {
        let mut conn = Connection::established(
            MockTransport::idle(),
            Role::Server,
            Config::default(),
        );
        let payload = vec![0u8; 125 + extra];
        prop_assert!(matches!(
            conn.ping(&payload),
            Err(Error::ControlFrameTooLarge(_))
        ));
        prop_assert!(conn.transport().output().is_empty());
    }

    // Masking discipline: inbound MASK bit must match the peer's role.
    #[test]
    fn prop_masking_discipline(
        fin in any::<bool>(),
        opcode in prop_oneof![Just(OpCode::Text), Just(OpCode::Binary)],
        payload_len in 0u64..200,
        key in any::<[u8; 4]>(),
    ) {
        let unmasked = FrameHead { fin, opcode, payload_len, mask: None };
        let masked = FrameHead { mask: Some(key), ..unmasked };

        prop_assert!(matches!(
            unmasked.validate(Role::Server),
            Err(Error::UnmaskedClientFrame)
        ));
        prop_assert!(masked.validate(Role::Server).is_ok());
        prop_assert!(matches!(
            masked.validate(Role::Client),
            Err(Error::MaskedServerFrame)
        ));
        prop_assert!(unmasked.validate(Role::Client).is_ok());
    }

    // A write after fin=false is a continuation no matter the binary flag.
    #[test]
    fn prop_continuation_overrides_binary_flag(
        first_binary in any::<bool>(),
        second_binary in any::<bool>(),
        first in prop::collection::vec(any::<u8>(), 0..64),
        second in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut conn = Connection::established(
            MockTransport::idle(),
            Role::Server,
            Config::default(),
        );
        conn.write(&first, false, first_binary);
        conn.write(&second, true, second_binary);

        let out = conn.transport().output();
        let expected_first = if first_binary { 0x02 } else { 0x01 };
        prop_assert_eq!(out[0], expected_first);
        // Server frames: 2-byte head for short payloads.
        let second_head = 2 + first.len();
        prop_assert_eq!(out[second_head], 0x80);
    }
}
