//! Wire vocabulary for the GHZ secret sharing protocol.
//!
//! Every party in a session speaks the same small language: which basis it
//! measured in, which bit it observed, and who it is. Only bases ever cross
//! the classical channel during a round; outcomes are revealed afterwards for
//! verification, never during sifting.
//!
//! # Framing
//!
//! ```text
//! ┌────────────────────────── 20-byte header ──────────────────────────┐
//! │ magic "GHZS" │ version │ opcode │ reserved │ round (u64) │ len (u32) │
//! └────────────────────────────────────────────────────────────────────┘
//! │ CBOR payload (len bytes)                                            │
//! ```
//!
//! All integers are big-endian. The payload is a CBOR document whose shape
//! depends on the opcode (see [`Opcode`]).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod basis;
mod error;
mod frame;
mod party;
pub mod payloads;

pub use basis::{Basis, Outcome};
pub use error::ProtoError;
pub use frame::{Frame, FrameHeader, MAX_PAYLOAD_SIZE, Opcode};
pub use party::{PartyId, Role};
pub use payloads::{BasisAnnouncement, Hello};
