//! Command-line arguments.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ghzss_core::{Environment, EveStrategy, NoiseConfig, Roster, Topology};
use ghzss_harness::{LatencyRange, SessionConfig};
use ghzss_proto::{Basis, PartyId};

use crate::error::CliError;

/// GHZ secret sharing simulator
#[derive(Parser, Debug)]
#[command(name = "ghzss")]
#[command(about = "Simulate the classical control layer of GHZ-based secret sharing")]
#[command(version)]
pub struct Cli {
    /// What to run
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one session and print its statistics
    Run {
        /// Session settings
        #[command(flatten)]
        session: SessionArgs,

        /// Put every party on its own simulated TCP host
        #[arg(long)]
        network: bool,
    },

    /// Run a session with and without the eavesdropper given by --eve
    Compare {
        /// Session settings
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Repeat a session over several channel noise levels
    SweepNoise {
        /// Session settings
        #[command(flatten)]
        session: SessionArgs,

        /// Noise levels to try
        #[arg(long, value_delimiter = ',', default_value = "0,0.05,0.1,0.15,0.2")]
        levels: Vec<f64>,
    },

    /// Repeat a session over several recipient counts
    SweepRecipients {
        /// Session settings
        #[command(flatten)]
        session: SessionArgs,

        /// Recipient counts to try
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5")]
        counts: Vec<usize>,
    },
}

/// Eavesdropper basis choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EveBasis {
    /// Fresh uniform basis every round
    Random,
    /// Always X
    X,
    /// Always Y
    Y,
}

impl From<EveBasis> for EveStrategy {
    fn from(basis: EveBasis) -> Self {
        match basis {
            EveBasis::Random => Self::Random,
            EveBasis::X => Self::Fixed(Basis::X),
            EveBasis::Y => Self::Fixed(Basis::Y),
        }
    }
}

/// Basis exchange routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TopologyKind {
    /// Everyone sends to everyone
    Mesh,
    /// Everyone sends to one hub, which relays the full set
    Coordinator,
    /// Accumulate along the recipient chain, then send back
    Chain,
}

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Dealer name
    #[arg(long, default_value = "Alice")]
    pub dealer: String,

    /// Recipient names, comma separated, in chain order
    #[arg(long, value_delimiter = ',', default_value = "Bob,Charlie")]
    pub recipients: Vec<String>,

    /// Rounds to run
    #[arg(short, long, default_value_t = 1000)]
    pub rounds: u64,

    /// Per-link channel noise probability
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Recipients whose links are intercepted, comma separated
    #[arg(long, value_delimiter = ',')]
    pub eve: Vec<String>,

    /// Eavesdropper basis choice
    #[arg(long, value_enum, default_value_t = EveBasis::Random)]
    pub eve_basis: EveBasis,

    /// Basis exchange routing
    #[arg(long, value_enum, default_value_t = TopologyKind::Mesh)]
    pub topology: TopologyKind,

    /// Coordinator hub (defaults to the first recipient)
    #[arg(long)]
    pub hub: Option<String>,

    /// Session seed (random if omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Shortest announcement delay in milliseconds
    #[arg(long, default_value_t = 1)]
    pub latency_min_ms: u64,

    /// Longest announcement delay in milliseconds
    #[arg(long, default_value_t = 5)]
    pub latency_max_ms: u64,

    /// Rounds slower than this are excluded, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub round_timeout_ms: u64,
}

impl SessionArgs {
    /// Build the session configuration. A missing seed is drawn from `env`.
    pub fn to_config(&self, env: &impl Environment) -> Result<SessionConfig, CliError> {
        let dealer = PartyId::new(self.dealer.as_str());
        let recipients: Vec<PartyId> = self.recipients.iter().map(PartyId::new).collect();

        let topology = match (self.topology, &self.hub) {
            (TopologyKind::Mesh, _) => Topology::FullMesh,
            (TopologyKind::Chain, _) => Topology::Chain,
            (TopologyKind::Coordinator, Some(hub)) => {
                Topology::Coordinator { hub: PartyId::new(hub) }
            },
            (TopologyKind::Coordinator, None) => {
                let roster = Roster::new(dealer.clone(), recipients.iter().cloned())?;
                Topology::default_coordinator(&roster)
            },
        };

        let mut noise = NoiseConfig::with_channel_noise(self.noise);
        if !self.eve.is_empty() {
            let targets = self.eve.iter().map(PartyId::new);
            noise = noise.with_eavesdropper(targets, self.eve_basis.into());
        }

        let config = SessionConfig {
            rounds: self.rounds,
            noise,
            topology,
            seed: self.seed.unwrap_or_else(|| env.random_u64()),
            latency: LatencyRange::new(
                Duration::from_millis(self.latency_min_ms),
                Duration::from_millis(self.latency_max_ms),
            ),
            round_timeout: Duration::from_millis(self.round_timeout_ms),
            ..SessionConfig::with_parties(dealer, recipients)
        };
        config.validate()?;
        Ok(config)
    }
}
