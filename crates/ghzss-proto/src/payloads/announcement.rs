//! Basis exchange payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Basis, PartyId};

/// Stream preamble.
///
/// Sent exactly once on every freshly opened stream so the receiver can bind
/// the stream to a peer identity. Announcements on the stream are attributed
/// to this sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Identity of the party that opened the stream.
    pub sender: PartyId,
}

/// Public basis information for one round.
///
/// A party's own announcement carries a single entry. Relays (coordinator
/// fan-out, chain accumulators) carry every entry known to the sender. Bases
/// are public; outcomes never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisAnnouncement {
    /// Round this announcement belongs to.
    pub round: u64,
    /// Known bases, keyed by party.
    pub bases: BTreeMap<PartyId, Basis>,
}

impl BasisAnnouncement {
    /// Announcement of a single party's own basis.
    pub fn own(round: u64, party: PartyId, basis: Basis) -> Self {
        Self { round, bases: BTreeMap::from([(party, basis)]) }
    }

    /// Announcement relaying a set of known bases.
    pub fn relay(round: u64, bases: BTreeMap<PartyId, Basis>) -> Self {
        Self { round, bases }
    }

    /// Number of entries carried.
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// True if no bases are carried.
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}
