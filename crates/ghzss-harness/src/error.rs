//! Harness errors.

use ghzss_core::{ConfigError, ProtocolError};
use thiserror::Error;

/// Session-level failure. Per-round failures never surface here; those
/// rounds are excluded from statistics instead.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The configuration was rejected before any round ran.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The async runtime could not be built.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The network simulation failed as a whole.
    #[error("simulation failed: {0}")]
    Simulation(String),
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::Runtime(err.to_string())
    }
}

/// Why a round was excluded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundFailure {
    /// A party failed or saw a peer break the protocol.
    #[error("{party}: {error}")]
    Protocol {
        /// Party that reported the failure.
        party: String,
        /// What went wrong.
        error: ProtocolError,
    },

    /// Not every party reached `Terminal` in time.
    #[error("round timed out")]
    Timeout,

    /// A party task died.
    #[error("party task failed: {0}")]
    Task(String),

    /// The parties' reports could not be combined or evaluated.
    #[error("{0}")]
    Record(ProtocolError),
}

impl RoundFailure {
    /// True if a peer broke the protocol, as opposed to infrastructure
    /// trouble.
    pub fn is_violation(&self) -> bool {
        match self {
            Self::Protocol { error, .. } | Self::Record(error) => error.is_violation(),
            Self::Timeout | Self::Task(_) => false,
        }
    }
}
