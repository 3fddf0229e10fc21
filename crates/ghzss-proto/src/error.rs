//! Protocol encoding errors.

use thiserror::Error;

/// Errors raised while parsing or encoding wire data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// Header magic did not match `GHZS`.
    #[error("bad magic: {0:02x?}")]
    BadMagic([u8; 4]),

    /// Header carries a version this build does not speak.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// Header opcode is not one of the known opcodes.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u8),

    /// Buffer ended before the header or payload was complete.
    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },

    /// Declared payload exceeds [`crate::MAX_PAYLOAD_SIZE`].
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// CBOR encoding or decoding failed.
    #[error("cbor error: {0}")]
    Cbor(String),

    /// A basis other than X or Y.
    #[error("invalid basis: {0:?}")]
    InvalidBasis(String),

    /// An outcome other than 0 or 1.
    #[error("invalid outcome: {0}")]
    InvalidOutcome(u8),
}
