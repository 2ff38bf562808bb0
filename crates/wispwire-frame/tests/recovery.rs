use bytes::BytesMut;
use proptest::collection::vec;
use proptest::prelude::*;
use wispwire_frame::{encode_frame, Decoder, Frame, MARKER, MAX_ID, MAX_PAYLOAD};

fn frame_strategy() -> impl Strategy<Value = Frame> {
    (0..=MAX_ID, vec(any::<u8>(), 0..=MAX_PAYLOAD)).prop_map(|(id, payload)| Frame::new(id, payload))
}

/// Line noise, with markers common enough to form short runs.
fn noise_strategy() -> impl Strategy<Value = Vec<u8>> {
    vec(prop_oneof![3 => any::<u8>(), 1 => Just(MARKER)], 0..32)
}

fn encode(frame: &Frame) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(u32::from(frame.id), &frame.payload, &mut buf).unwrap();
    buf.to_vec()
}

proptest! {
    #[test]
    fn every_frame_survives_encoding(frame in frame_strategy()) {
        let wire = encode(&frame);
        prop_assert_eq!(wire.len(), frame.wire_size());

        let frames = Decoder::new().decode(&wire);
        prop_assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn frames_are_recovered_from_noise(
        parts in vec((noise_strategy(), frame_strategy()), 1..8),
        tail in noise_strategy(),
    ) {
        let mut wire = Vec::new();
        let mut expected = Vec::new();
        for (noise, frame) in parts {
            wire.extend(noise);
            wire.extend(encode(&frame));
            expected.push(frame);
        }
        wire.extend(tail);

        let mut decoder = Decoder::new();
        prop_assert_eq!(decoder.decode(&wire), expected.clone());
        prop_assert_eq!(decoder.stats().frames, expected.len() as u64);
    }

    #[test]
    fn marker_runs_before_a_frame_are_absorbed(
        run in 0usize..12,
        frame in frame_strategy(),
    ) {
        let mut wire = std::iter::repeat(MARKER).take(run).collect::<Vec<_>>();
        wire.extend(encode(&frame));

        let mut decoder = Decoder::new();
        prop_assert_eq!(decoder.decode(&wire), vec![frame]);
        prop_assert_eq!(decoder.stats().reserved, 0);
    }

    #[test]
    fn damaged_end_byte_keeps_both_frames(
        first in frame_strategy(),
        end in prop_oneof![Just(None), Just(Some(MARKER)), any::<u8>().prop_map(Some)],
        next in frame_strategy(),
    ) {
        let mut wire = encode(&first);
        wire.pop();
        wire.extend(end);
        wire.extend(encode(&next));

        let frames = Decoder::new().decode(&wire);
        prop_assert_eq!(frames, vec![first, next]);
    }

    #[test]
    fn truncated_frame_does_not_take_the_next_one(
        cut_frame in frame_strategy(),
        cut in any::<prop::sample::Index>(),
        next in frame_strategy(),
    ) {
        let cut_wire = encode(&cut_frame);
        let prefix = &cut_wire[..cut.index(cut_wire.len())];

        let mut wire = prefix.to_vec();
        wire.extend(encode(&next));

        let frames = Decoder::new().decode(&wire);
        prop_assert_eq!(frames.last(), Some(&next));
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in vec(any::<u8>(), 0..2048)) {
        let mut decoder = Decoder::new();
        let frames = decoder.decode(&bytes);
        prop_assert_eq!(frames.len() as u64, decoder.stats().frames);
        for frame in frames {
            prop_assert!(frame.id <= MAX_ID);
        }
    }

    #[test]
    fn single_corrupted_byte_never_yields_a_wrong_frame(
        frame in frame_strategy(),
        flip in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let mut wire = encode(&frame);
        let at = flip.index(wire.len());
        wire[at] ^= mask;

        for decoded in Decoder::new().decode(&wire) {
            prop_assert_eq!(&decoded, &frame);
        }
    }
}
