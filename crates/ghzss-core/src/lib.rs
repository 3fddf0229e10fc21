//! Sans-IO core of GHZ secret sharing.
//!
//! One dealer shares an N-qubit GHZ state with N−1 recipients. Every party
//! measures its qubit in X or Y, the parties exchange bases (never outcomes)
//! and keep the rounds with an even number of Y bases. In a kept round the
//! XOR of all outcomes is fixed, so the recipients together, and only
//! together, can recover the dealer's bit.
//!
//! ## Architecture
//!
//! ```text
//! ghzss-core
//!   ├─ sifting        (is_valid, check_parity, reconstruct)
//!   ├─ round          (RoundRecord, RoundResult, evaluate)
//!   ├─ noise          (channel noise, intercept-resend)
//!   ├─ topology       (mesh, coordinator, chain)
//!   ├─ machine        (per-party round state machine)
//!   ├─ driver         (async executor for the machine)
//!   └─ stats          (QBER, key rate, secret sharing rate)
//! ```
//!
//! The quantum layer and the classical channel are seams
//! ([`QuantumLayer`], [`Transport`]); simulations of both live in
//! `ghzss-harness`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod driver;
pub mod env;
pub mod error;
pub mod machine;
pub mod noise;
pub mod party;
pub mod quantum;
pub mod round;
pub mod sifting;
pub mod stats;
pub mod topology;
pub mod transport;

pub use driver::PartyDriver;
pub use env::{Environment, derive_seed};
pub use error::{ConfigError, EvaluationError, ProtocolError, QuantumError, TransportError};
pub use machine::{BasisPolicy, PartyAction, PartyEvent, RoundMachine, RoundState};
pub use noise::{
    ChannelNoise, EavesdropperConfig, EveStrategy, InterceptResend, NoNoise, NoiseConfig,
    NoiseModel, NoisePipeline,
};
pub use party::{Party, Roster};
pub use quantum::{QuantumLayer, ShareHandle};
pub use round::{PartyReport, RoundRecord, RoundResult, evaluate};
pub use stats::{BasisTally, Rate, SessionStatistics, StatsAggregator};
pub use topology::Topology;
pub use transport::Transport;
