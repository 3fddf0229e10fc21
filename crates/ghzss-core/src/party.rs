//! Session membership.
//!
//! A [`Roster`] is the immutable list of parties for a session: the dealer
//! first, then the recipients in configuration order. That order is also the
//! chain order of [`Topology::Chain`](crate::topology::Topology::Chain).

use std::collections::BTreeSet;

use ghzss_proto::{PartyId, Role};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, topology::Topology};

/// Dealer plus recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    dealer: PartyId,
    recipients: Vec<PartyId>,
}

impl Roster {
    /// Build and validate a roster.
    ///
    /// # Errors
    ///
    /// - `TooFewParties` with no recipients
    /// - `DuplicateParty` if a name repeats, the dealer's included
    pub fn new(
        dealer: impl Into<PartyId>,
        recipients: impl IntoIterator<Item = PartyId>,
    ) -> Result<Self, ConfigError> {
        let roster = Self { dealer: dealer.into(), recipients: recipients.into_iter().collect() };

        if roster.len() < 2 {
            return Err(ConfigError::TooFewParties(roster.len()));
        }

        let mut seen = BTreeSet::new();
        for party in roster.parties() {
            if !seen.insert(party) {
                return Err(ConfigError::DuplicateParty(party.clone()));
            }
        }

        Ok(roster)
    }

    /// The dealer.
    pub fn dealer(&self) -> &PartyId {
        &self.dealer
    }

    /// Recipients in configuration order.
    pub fn recipients(&self) -> &[PartyId] {
        &self.recipients
    }

    /// All parties, dealer first.
    pub fn parties(&self) -> impl Iterator<Item = &PartyId> {
        std::iter::once(&self.dealer).chain(&self.recipients)
    }

    /// All parties as an owned list, dealer first.
    pub fn to_vec(&self) -> Vec<PartyId> {
        self.parties().cloned().collect()
    }

    /// Number of parties, dealer included.
    pub fn len(&self) -> usize {
        self.recipients.len() + 1
    }

    /// Always false for a validated roster.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Is `party` a member?
    pub fn contains(&self, party: &PartyId) -> bool {
        self.parties().any(|p| p == party)
    }

    /// Position in dealer-first order.
    pub fn position(&self, party: &PartyId) -> Option<usize> {
        self.parties().position(|p| p == party)
    }

    /// Role of a member.
    pub fn role_of(&self, party: &PartyId) -> Option<Role> {
        if *party == self.dealer {
            Some(Role::Dealer)
        } else if self.recipients.contains(party) {
            Some(Role::Recipient)
        } else {
            None
        }
    }
}

/// One participant as seen by its own state machine.
///
/// Immutable for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    id: PartyId,
    role: Role,
    peers: Vec<PartyId>,
}

impl Party {
    /// Resolve `id`'s role and peers.
    ///
    /// Returns `None` if `id` is not on the roster.
    pub fn new(id: &PartyId, roster: &Roster, topology: &Topology) -> Option<Self> {
        let role = roster.role_of(id)?;
        Some(Self { id: id.clone(), role, peers: topology.peers_of(id, roster) })
    }

    /// Identity.
    pub fn id(&self) -> &PartyId {
        &self.id
    }

    /// Dealer or recipient.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Parties this one exchanges basis announcements with.
    pub fn peers(&self) -> &[PartyId] {
        &self.peers
    }

    /// Is `other` a peer?
    pub fn is_peer(&self, other: &PartyId) -> bool {
        self.peers.contains(other)
    }
}
