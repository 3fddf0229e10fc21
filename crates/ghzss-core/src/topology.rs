//! Basis exchange topologies.
//!
//! Every topology ends with the same full basis map at every party. They
//! differ only in who talks to whom and how many messages a round costs.
//!
//! ```text
//! FullMesh            Coordinator { hub: B }      Chain (A, B, C, D)
//!
//!   A ─── B             A ──┐                    A → B → C → D   accumulate
//!   │ ╲ ╱ │                 ▼                    A ← B ← C ← D   full set
//!   │ ╱ ╲ │             C ─▶ B ─▶ relay to all
//!   C ─── D                 ▲
//!                       D ──┘
//! ```

use std::fmt;

use ghzss_proto::PartyId;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, party::Roster};

/// Routing strategy for basis announcements.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Topology {
    /// Every party sends its basis to every other party.
    #[default]
    FullMesh,
    /// Everyone sends to `hub`; the hub relays the complete set back.
    Coordinator {
        /// Collecting party.
        hub: PartyId,
    },
    /// Accumulator travels dealer to last recipient, then the full set
    /// travels back.
    Chain,
}

impl Topology {
    /// Coordinator relay through the dealer's first neighbour.
    pub fn default_coordinator(roster: &Roster) -> Self {
        let hub = roster.recipients().first().unwrap_or(roster.dealer()).clone();
        Self::Coordinator { hub }
    }

    /// Check the topology against the roster.
    pub fn validate(&self, roster: &Roster) -> Result<(), ConfigError> {
        match self {
            Self::Coordinator { hub } if !roster.contains(hub) => {
                Err(ConfigError::UnknownCoordinator(hub.clone()))
            },
            _ => Ok(()),
        }
    }

    /// Parties `me` exchanges announcements with, in roster order.
    pub fn peers_of(&self, me: &PartyId, roster: &Roster) -> Vec<PartyId> {
        match self {
            Self::FullMesh => roster.parties().filter(|p| *p != me).cloned().collect(),
            Self::Coordinator { hub } if hub == me => {
                roster.parties().filter(|p| *p != me).cloned().collect()
            },
            Self::Coordinator { hub } => vec![hub.clone()],
            Self::Chain => {
                let Some(pos) = roster.position(me) else {
                    return Vec::new();
                };
                let parties = roster.to_vec();
                let prev = pos.checked_sub(1).and_then(|i| parties.get(i));
                let next = parties.get(pos + 1);
                prev.into_iter().chain(next).cloned().collect()
            },
        }
    }

    /// Announcements sent per round with `n` parties.
    pub fn messages_per_round(&self, n: usize) -> usize {
        match self {
            Self::FullMesh => n * n.saturating_sub(1),
            Self::Coordinator { .. } | Self::Chain => 2 * n.saturating_sub(1),
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullMesh => write!(f, "full mesh"),
            Self::Coordinator { hub } => write!(f, "coordinator relay via {hub}"),
            Self::Chain => write!(f, "chain relay"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        Roster::new("A", ["B", "C", "D"].map(PartyId::new)).unwrap()
    }

    fn ids(names: &[&str]) -> Vec<PartyId> {
        names.iter().map(|n| PartyId::new(*n)).collect()
    }

    #[test]
    fn mesh_peers_are_everyone_else() {
        assert_eq!(Topology::FullMesh.peers_of(&PartyId::new("C"), &roster()), ids(&["A", "B", "D"]));
    }

    #[test]
    fn coordinator_peers() {
        let topology = Topology::default_coordinator(&roster());
        assert_eq!(topology, Topology::Coordinator { hub: PartyId::new("B") });
        assert_eq!(topology.peers_of(&PartyId::new("B"), &roster()), ids(&["A", "C", "D"]));
        assert_eq!(topology.peers_of(&PartyId::new("D"), &roster()), ids(&["B"]));
    }

    #[test]
    fn chain_peers_are_neighbours() {
        let r = roster();
        assert_eq!(Topology::Chain.peers_of(&PartyId::new("A"), &r), ids(&["B"]));
        assert_eq!(Topology::Chain.peers_of(&PartyId::new("C"), &r), ids(&["B", "D"]));
        assert_eq!(Topology::Chain.peers_of(&PartyId::new("D"), &r), ids(&["C"]));
    }

    #[test]
    fn unknown_hub_is_rejected() {
        let topology = Topology::Coordinator { hub: PartyId::new("Z") };
        assert_eq!(topology.validate(&roster()), Err(ConfigError::UnknownCoordinator(PartyId::new("Z"))));
    }

    #[test]
    fn message_counts() {
        assert_eq!(Topology::FullMesh.messages_per_round(4), 12);
        assert_eq!(Topology::Chain.messages_per_round(4), 6);
        assert_eq!(Topology::default_coordinator(&roster()).messages_per_round(4), 6);
    }
}
