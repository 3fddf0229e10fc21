//! Fuzz target for frame decoding
//!
//! # Strategy
//!
//! - Raw bytes straight into `Frame::decode`
//! - Valid headers followed by arbitrary CBOR payloads
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A decoded frame re-encodes to the bytes it was decoded from
//! - A decoded announcement carries the round of its header

#![no_main]

use arbitrary::Arbitrary;
use ghzss_proto::{Frame, FrameHeader};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum FuzzInput {
    Raw(Vec<u8>),
    Framed { opcode: u8, round: u64, payload: Vec<u8> },
}

fuzz_target!(|input: FuzzInput| {
    let bytes = match input {
        FuzzInput::Raw(bytes) => bytes,
        FuzzInput::Framed { opcode, round, payload } => {
            let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
            let mut bytes = b"GHZS".to_vec();
            bytes.extend_from_slice(&[1, opcode, 0, 0]);
            bytes.extend_from_slice(&round.to_be_bytes());
            bytes.extend_from_slice(&len.to_be_bytes());
            bytes.extend_from_slice(&payload);
            bytes
        },
    };

    let Ok(frame) = Frame::decode(&bytes) else {
        return;
    };

    let end = FrameHeader::SIZE + frame.header.payload_size();
    assert_eq!(&frame.to_bytes()[..], &bytes[..end]);

    if let Ok(announcement) = frame.announcement() {
        assert_eq!(announcement.round, frame.header.round());
    }
    let _ = frame.hello_payload();
});
