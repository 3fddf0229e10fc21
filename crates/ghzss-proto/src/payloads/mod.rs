//! Frame payloads.
//!
//! Payloads are CBOR documents carried after the frame header. The header's
//! opcode tells the receiver which type to decode.

mod announcement;

pub use announcement::{BasisAnnouncement, Hello};
