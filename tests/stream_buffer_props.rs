//! Property tests for frame reassembly and counter rewriting.

use proptest::prelude::*;

use wirebridge::protocol::{build_frame, Header, Role, StreamBuffer, MAX_MESSAGE_ID};
use wirebridge::sequence::SequenceState;

fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Primary), Just(Role::Secondary)]
}

fn frames() -> impl Strategy<Value = Vec<(u16, u32, Vec<u8>)>> {
    prop::collection::vec(
        (
            0..=MAX_MESSAGE_ID,
            any::<u32>(),
            prop::collection::vec(any::<u8>(), 0..300),
        ),
        1..12,
    )
}

proptest! {
    #[test]
    fn chunking_never_changes_extracted_frames(
        origin in role(),
        specs in frames(),
        cuts in prop::collection::vec(1usize..64, 1..40),
    ) {
        let mut stream = Vec::new();
        let mut expected = Vec::new();
        for (id, counter, payload) in &specs {
            let counter = origin.carries_counter().then_some(*counter);
            let bytes = build_frame(&Header::new(*id, counter, payload.len() as u32), payload);
            expected.push((*id, counter, payload.clone(), bytes.clone()));
            stream.extend(bytes);
        }

        let mut buffer = StreamBuffer::new(origin);
        let mut extracted = Vec::new();
        let mut offset = 0;
        for cut in cuts.iter().cycle() {
            if offset >= stream.len() {
                break;
            }
            let end = (offset + cut).min(stream.len());
            extracted.extend(buffer.push(&stream[offset..end]));
            offset = end;

            // consumed frames plus the tail always rebuild the input so far
            let mut rebuilt: Vec<u8> = extracted.iter().flat_map(|f| f.raw().to_vec()).collect();
            rebuilt.extend_from_slice(buffer.pending());
            prop_assert_eq!(&rebuilt[..], &stream[..end]);
        }

        prop_assert!(buffer.is_empty());
        prop_assert_eq!(extracted.len(), expected.len());
        for (frame, (id, counter, payload, bytes)) in extracted.iter().zip(&expected) {
            prop_assert_eq!(frame.id(), *id);
            prop_assert_eq!(frame.counter(), *counter);
            prop_assert_eq!(frame.payload(), &payload[..]);
            prop_assert_eq!(frame.raw().as_ref(), &bytes[..]);
        }
    }

    #[test]
    fn injections_shift_next_genuine_counter(
        start in 0u32..1_000_000,
        injected in 0u32..50,
    ) {
        let mut state = SequenceState::new();
        prop_assert_eq!(state.rewrite_genuine(start), start);

        for _ in 0..injected {
            state.assign_toward_server();
        }

        prop_assert_eq!(state.rewrite_genuine(start + 1), start + 1 + injected);
    }
}
