//! Core error types.
//!
//! Errors are split by blast radius:
//!
//! - [`EvaluationError`]: a verification function was called on data it is
//!   not defined for. Callers guard with `is_valid` first.
//! - [`ProtocolError`]: something went wrong inside one round. The round is
//!   excluded from statistics; the session continues.
//! - [`ConfigError`]: the session cannot start. Reported immediately, never
//!   retried.

use std::time::Duration;

use ghzss_proto::{PartyId, ProtoError};
use thiserror::Error;

/// Misuse of the sifting and verification functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// Parity or reconstruction requested for a round with an odd Y count.
    #[error("round is not valid: {y_count} Y bases (odd)")]
    InvalidRound {
        /// Number of parties that measured in Y.
        y_count: usize,
    },

    /// The named dealer has no entry in the record.
    #[error("dealer {0} has no entry in the round record")]
    UnknownDealer(PartyId),

    /// A party present in the bases has no outcome, or vice versa.
    #[error("party {0} is missing from the round record")]
    MissingParty(PartyId),

    /// Fewer than two parties in a record.
    #[error("round record needs at least 2 parties, got {0}")]
    TooFewParties(usize),
}

/// Failure of the quantum collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantumError {
    /// The party is not part of the entangled state.
    #[error("no share prepared for {party} in round {round}")]
    NoShare {
        /// Requesting party.
        party: PartyId,
        /// Requested round.
        round: u64,
    },

    /// The share was already measured this round.
    #[error("share of {party} in round {round} already measured")]
    AlreadyMeasured {
        /// Measuring party.
        party: PartyId,
        /// Round of the share.
        round: u64,
    },

    /// The share belongs to a round that has been discarded.
    #[error("stale share handle for round {0}")]
    StaleHandle(u64),

    /// Internal state could not be accessed.
    #[error("quantum layer unavailable: {0}")]
    Unavailable(String),
}

/// Failure of the classical channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No channel to the given peer.
    #[error("no channel to {0}")]
    UnknownPeer(PartyId),

    /// The channel closed before the round finished.
    #[error("channel closed: {0}")]
    Closed(String),

    /// Bytes on the wire could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] ProtoError),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Per-round protocol failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Announcement for a different round.
    #[error("round mismatch: expected {expected}, got {actual}")]
    RoundMismatch {
        /// Round the party is running.
        expected: u64,
        /// Round carried by the message.
        actual: u64,
    },

    /// Announcement from a party this party does not exchange with.
    #[error("announcement from unexpected sender {0}")]
    UnknownSender(PartyId),

    /// Announcement mentions a party outside the session.
    #[error("announcement names unknown party {0}")]
    UnknownParty(PartyId),

    /// Two announcements disagree on a party's basis.
    #[error("conflicting basis for {0}")]
    ConflictingBasis(PartyId),

    /// Event not legal in the current state.
    #[error("unexpected event {event} in state {state}")]
    UnexpectedEvent {
        /// Event name.
        event: &'static str,
        /// State name.
        state: &'static str,
    },

    /// A required party did not report.
    #[error("missing report from {0}")]
    MissingParty(PartyId),

    /// Parties finished the round with different basis sets.
    #[error("parties disagree on the public bases of round {0}")]
    InconsistentViews(u64),

    /// Classical channel failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Quantum collaborator failure.
    #[error("quantum error: {0}")]
    Quantum(#[from] QuantumError),

    /// Verification misuse.
    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
}

impl ProtocolError {
    /// True if the failure means a peer broke the protocol, as opposed to
    /// infrastructure trouble.
    ///
    /// Neither kind aborts a session: the round is excluded either way. The
    /// distinction only drives logging.
    pub fn is_violation(&self) -> bool {
        match self {
            Self::RoundMismatch { .. }
            | Self::UnknownSender(_)
            | Self::UnknownParty(_)
            | Self::ConflictingBasis(_)
            | Self::MissingParty(_)
            | Self::InconsistentViews(_)
            | Self::Transport(TransportError::Decode(_)) => true,

            Self::UnexpectedEvent { .. }
            | Self::Transport(_)
            | Self::Quantum(_)
            | Self::Evaluation(_) => false,
        }
    }
}

/// Session-level configuration error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Fewer than two parties.
    #[error("a session needs at least 2 parties, got {0}")]
    TooFewParties(usize),

    /// The same name appears twice.
    #[error("duplicate party {0}")]
    DuplicateParty(PartyId),

    /// Noise level outside `[0, 1]`.
    #[error("noise level {0} outside [0, 1]")]
    NoiseOutOfRange(f64),

    /// Eavesdropper target is not a recipient.
    #[error("eavesdropper target {0} is not a recipient")]
    InvalidTarget(PartyId),

    /// Coordinator hub is not a party.
    #[error("coordinator {0} is not a party")]
    UnknownCoordinator(PartyId),

    /// A per-party setting names a party outside the session.
    #[error("{0} is not a party of this session")]
    UnknownParty(PartyId),

    /// Zero rounds requested.
    #[error("a session needs at least 1 round")]
    NoRounds,

    /// Delay range whose upper bound is below its lower bound.
    #[error("{name} range is inverted: min {min:?} > max {max:?}")]
    InvalidLatency {
        /// Which setting.
        name: &'static str,
        /// Lower bound.
        min: Duration,
        /// Upper bound.
        max: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_wire_data_is_a_violation() {
        let err = ProtocolError::Transport(TransportError::Decode(ProtoError::UnknownOpcode(7)));
        assert!(err.is_violation());
    }

    #[test]
    fn closed_channel_is_not_a_violation() {
        let err = ProtocolError::Transport(TransportError::Closed("peer gone".into()));
        assert!(!err.is_violation());
    }

    #[test]
    fn error_display() {
        insta::assert_snapshot!(
            ProtocolError::RoundMismatch { expected: 5, actual: 3 },
            @"round mismatch: expected 5, got 3"
        );
        insta::assert_snapshot!(
            EvaluationError::InvalidRound { y_count: 3 },
            @"round is not valid: 3 Y bases (odd)"
        );
        insta::assert_snapshot!(
            ConfigError::TooFewParties(1),
            @"a session needs at least 2 parties, got 1"
        );
        insta::assert_snapshot!(
            ConfigError::InvalidLatency {
                name: "latency",
                min: Duration::from_millis(10),
                max: Duration::from_millis(5),
            },
            @"latency range is inverted: min 10ms > max 5ms"
        );
    }
}
