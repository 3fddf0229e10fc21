//! Deterministic simulation of GHZ secret sharing sessions.
//!
//! `ghzss-core` defines what a party does in a round; this crate supplies
//! everything around it: an ideal GHZ source, classical channels, the
//! session loop and the experiments built on top of it.
//!
//! Two ways to run a session:
//!
//! - [`Session`]: all parties on one paused tokio runtime, connected by
//!   in-memory channels. Rounds run in lockstep. This is what
//!   [`run_session`] and the experiments use.
//! - [`run_networked_session`]: every party on its own turmoil host,
//!   talking framed TCP. Parties drift freely across rounds.
//!
//! Both replay bit-for-bit from [`SessionConfig::seed`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ghzss_core::NoiseConfig;
//! use ghzss_harness::run_session;
//! use ghzss_proto::PartyId;
//!
//! let stats = run_session(
//!     "Alice",
//!     ["Bob", "Charlie"].map(PartyId::new),
//!     1000,
//!     NoiseConfig::with_channel_noise(0.05),
//! )?;
//! println!("{stats}");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod config;
mod error;
mod experiments;
pub mod model;
mod network;
mod quantum;
mod session;
mod sim_env;
mod sim_transport;

pub use channel::ChannelTransport;
pub use config::{LatencyRange, SessionConfig};
pub use error::{RoundFailure, SessionError};
pub use experiments::{
    EavesdroppingComparison, SweepPoint, compare_eavesdropping, sweep_noise, sweep_recipients,
};
pub use model::{ModelRound, ModelVerdict};
pub use network::{PORT, run_networked_session};
pub use quantum::SimQuantumLayer;
pub use session::{RoundObserver, Session, SessionHandle, run_session};
pub use sim_env::SimEnv;
pub use sim_transport::SimTransport;
