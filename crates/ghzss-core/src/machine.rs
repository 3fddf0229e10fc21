//! Per-party round state machine.
//!
//! Pure state machine: events in, actions out. The caller (see
//! [`PartyDriver`](crate::driver::PartyDriver)) owns all I/O: it waits for the
//! share, performs the measurement, moves announcements and collects the
//! final report.
//!
//! # State Machine
//!
//! ```text
//! AwaitEntanglement ──ShareReady──▶ ChooseBasis ──▶ Measure
//!                                                      │ Measured
//!                                                      ▼
//!             Terminal ◀── Decide ◀── CollectBases ◀── BroadcastBasis
//! ```
//!
//! `ChooseBasis`, `BroadcastBasis` and `Decide` are passed through within a
//! single `handle` call. Announcements may arrive in any state before
//! `Terminal`; those that arrive before this party has broadcast are buffered
//! and merged on entering `CollectBases`.

use std::sync::Arc;

use ghzss_proto::{Basis, BasisAnnouncement, Outcome, PartyId};
use serde::{Deserialize, Serialize};

use crate::{
    env::Environment,
    error::ProtocolError,
    party::{Party, Roster},
    round::PartyReport,
    sifting::{self, BasisMap},
    topology::Topology,
};

/// Round states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Waiting for this party's share to arrive.
    AwaitEntanglement,
    /// Picking a measurement basis.
    ChooseBasis,
    /// Measurement requested, outcome pending.
    Measure,
    /// Sending own basis according to the topology.
    BroadcastBasis,
    /// Waiting for the remaining bases.
    CollectBases,
    /// All bases known; building the report.
    Decide,
    /// Round finished.
    Terminal,
}

impl RoundState {
    /// Static name for errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::AwaitEntanglement => "AwaitEntanglement",
            Self::ChooseBasis => "ChooseBasis",
            Self::Measure => "Measure",
            Self::BroadcastBasis => "BroadcastBasis",
            Self::CollectBases => "CollectBases",
            Self::Decide => "Decide",
            Self::Terminal => "Terminal",
        }
    }
}

/// How a party picks its basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BasisPolicy {
    /// Uniform over X and Y, drawn from the environment.
    #[default]
    Uniform,
    /// Always the same basis.
    Fixed(Basis),
}

/// Input to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyEvent {
    /// The quantum layer delivered this party's share.
    ShareReady,
    /// Outcome of the requested measurement, after noise.
    Measured(Outcome),
    /// An announcement from a peer.
    AnnouncementReceived {
        /// Sender.
        from: PartyId,
        /// Content.
        announcement: BasisAnnouncement,
    },
}

impl PartyEvent {
    /// Static name for errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShareReady => "ShareReady",
            Self::Measured(_) => "Measured",
            Self::AnnouncementReceived { .. } => "AnnouncementReceived",
        }
    }
}

/// Output of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyAction {
    /// Measure the share in `basis` and feed back [`PartyEvent::Measured`].
    Measure {
        /// Chosen basis.
        basis: Basis,
    },
    /// Deliver an announcement to a peer.
    Send {
        /// Recipient.
        to: PartyId,
        /// Content.
        announcement: BasisAnnouncement,
    },
    /// The round is over for this party. Always the last action.
    Decided(PartyReport),
}

/// One party's view of one round.
pub struct RoundMachine<E: Environment> {
    env: E,
    party: Party,
    roster: Arc<Roster>,
    topology: Topology,
    policy: BasisPolicy,
    round: u64,
    state: RoundState,
    basis: Option<Basis>,
    outcome: Option<Outcome>,
    known: BasisMap,
    pending: Vec<(PartyId, BasisAnnouncement)>,
    forwarded: bool,
}

impl<E: Environment> RoundMachine<E> {
    /// Fresh machine in `AwaitEntanglement`.
    pub fn new(
        env: E,
        party: Party,
        roster: Arc<Roster>,
        topology: Topology,
        policy: BasisPolicy,
        round: u64,
    ) -> Self {
        Self {
            env,
            party,
            roster,
            topology,
            policy,
            round,
            state: RoundState::AwaitEntanglement,
            basis: None,
            outcome: None,
            known: BasisMap::new(),
            pending: Vec::new(),
            forwarded: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Round this machine runs.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Bases known so far, own included once chosen.
    pub fn known_bases(&self) -> &BasisMap {
        &self.known
    }

    /// Announcements held back until this party has broadcast.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Any error poisons the round: the caller must stop feeding events and
    /// exclude the round.
    pub fn handle(&mut self, event: PartyEvent) -> Result<Vec<PartyAction>, ProtocolError> {
        match (self.state, event) {
            (RoundState::AwaitEntanglement, PartyEvent::ShareReady) => {
                Ok(self.handle_share_ready())
            },
            (RoundState::Measure, PartyEvent::Measured(outcome)) => self.handle_measured(outcome),
            (state, PartyEvent::AnnouncementReceived { from, announcement })
                if state != RoundState::Terminal =>
            {
                self.handle_announcement(from, announcement)
            },
            (state, event) => {
                Err(ProtocolError::UnexpectedEvent { event: event.name(), state: state.name() })
            },
        }
    }

    fn handle_share_ready(&mut self) -> Vec<PartyAction> {
        self.state = RoundState::ChooseBasis;

        let basis = match self.policy {
            BasisPolicy::Uniform => self.env.random_basis(),
            BasisPolicy::Fixed(basis) => basis,
        };
        self.basis = Some(basis);
        self.known.insert(self.party.id().clone(), basis);

        self.state = RoundState::Measure;
        vec![PartyAction::Measure { basis }]
    }

    fn handle_measured(&mut self, outcome: Outcome) -> Result<Vec<PartyAction>, ProtocolError> {
        self.outcome = Some(outcome);

        self.state = RoundState::BroadcastBasis;
        let mut actions = self.broadcast();

        self.state = RoundState::CollectBases;
        for (from, announcement) in std::mem::take(&mut self.pending) {
            self.merge(&from, announcement)?;
        }
        actions.extend(self.progress());

        Ok(actions)
    }

    fn handle_announcement(
        &mut self,
        from: PartyId,
        announcement: BasisAnnouncement,
    ) -> Result<Vec<PartyAction>, ProtocolError> {
        if announcement.round != self.round {
            return Err(ProtocolError::RoundMismatch {
                expected: self.round,
                actual: announcement.round,
            });
        }
        if !self.party.is_peer(&from) {
            return Err(ProtocolError::UnknownSender(from));
        }
        if let Some(stranger) = announcement.bases.keys().find(|p| !self.roster.contains(p)) {
            return Err(ProtocolError::UnknownParty(stranger.clone()));
        }

        if self.state != RoundState::CollectBases {
            tracing::trace!(
                party = %self.party.id(),
                round = self.round,
                %from,
                state = self.state.name(),
                "buffering early announcement"
            );
            self.pending.push((from, announcement));
            return Ok(Vec::new());
        }

        self.merge(&from, announcement)?;
        Ok(self.progress())
    }

    fn merge(
        &mut self,
        from: &PartyId,
        announcement: BasisAnnouncement,
    ) -> Result<(), ProtocolError> {
        if !announcement.bases.contains_key(from) {
            return Err(ProtocolError::MissingParty(from.clone()));
        }

        for (party, basis) in announcement.bases {
            match self.known.get(&party) {
                Some(existing) if *existing != basis => {
                    return Err(ProtocolError::ConflictingBasis(party));
                },
                Some(_) => {},
                None => {
                    self.known.insert(party, basis);
                },
            }
        }
        Ok(())
    }

    fn own_announcement(&self, basis: Basis) -> BasisAnnouncement {
        BasisAnnouncement::own(self.round, self.party.id().clone(), basis)
    }

    fn relay(&self) -> BasisAnnouncement {
        BasisAnnouncement::relay(self.round, self.known.clone())
    }

    fn send(to: &PartyId, announcement: BasisAnnouncement) -> PartyAction {
        PartyAction::Send { to: to.clone(), announcement }
    }

    /// Initial sends on entering `BroadcastBasis`.
    fn broadcast(&self) -> Vec<PartyAction> {
        let Some(basis) = self.basis else {
            return Vec::new();
        };

        match &self.topology {
            Topology::FullMesh => self
                .party
                .peers()
                .iter()
                .map(|peer| Self::send(peer, self.own_announcement(basis)))
                .collect(),
            Topology::Coordinator { hub } if hub != self.party.id() => {
                vec![Self::send(hub, self.own_announcement(basis))]
            },
            // The hub only speaks once complete; chain sends are driven by
            // what has arrived.
            Topology::Coordinator { .. } | Topology::Chain => Vec::new(),
        }
    }

    /// Sends unlocked by newly merged bases, then the decision if complete.
    fn progress(&mut self) -> Vec<PartyAction> {
        let complete = self.known.len() == self.roster.len();
        let me = self.party.id();
        let mut actions = Vec::new();

        match &self.topology {
            Topology::FullMesh => {},
            Topology::Coordinator { hub } => {
                if complete && hub == me {
                    let relay = self.relay();
                    actions.extend(self.party.peers().iter().map(|p| Self::send(p, relay.clone())));
                }
            },
            Topology::Chain => {
                let order = self.roster.to_vec();
                let pos = self.roster.position(me).unwrap_or_default();

                if !self.forwarded {
                    if let Some(next) = order.get(pos + 1) {
                        let prefix_known =
                            order.iter().take(pos + 1).all(|p| self.known.contains_key(p));
                        if prefix_known {
                            actions.push(Self::send(next, self.relay()));
                            self.forwarded = true;
                        }
                    }
                }
                if complete {
                    if let Some(prev) = pos.checked_sub(1).and_then(|i| order.get(i)) {
                        actions.push(Self::send(prev, self.relay()));
                    }
                }
            },
        }

        if complete {
            if let Some(report) = self.decide() {
                actions.push(PartyAction::Decided(report));
            }
        }
        actions
    }

    fn decide(&mut self) -> Option<PartyReport> {
        self.state = RoundState::Decide;
        let (basis, outcome) = (self.basis?, self.outcome?);

        let report = PartyReport {
            party: self.party.id().clone(),
            round: self.round,
            basis,
            outcome,
            bases: self.known.clone(),
        };

        tracing::debug!(
            party = %self.party.id(),
            round = self.round,
            y_count = sifting::y_count(self.known.values()),
            valid = report.is_valid(),
            "round decided"
        );

        self.state = RoundState::Terminal;
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Mutex,
        time::{Duration, Instant},
    };

    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[derive(Clone)]
    struct TestEnv(Arc<Mutex<ChaCha8Rng>>);

    impl TestEnv {
        fn new(seed: u64) -> Self {
            Self(Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))))
        }
    }

    impl Environment for TestEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            self.0.lock().unwrap().fill_bytes(buffer);
        }
    }

    fn roster() -> Arc<Roster> {
        Arc::new(Roster::new("Alice", ["Bob", "Charlie"].map(PartyId::new)).unwrap())
    }

    fn machine(name: &str, topology: Topology, basis: Basis) -> RoundMachine<TestEnv> {
        let roster = roster();
        let party = Party::new(&PartyId::new(name), &roster, &topology).unwrap();
        RoundMachine::new(TestEnv::new(1), party, roster, topology, BasisPolicy::Fixed(basis), 4)
    }

    fn own(name: &str, basis: Basis) -> PartyEvent {
        PartyEvent::AnnouncementReceived {
            from: PartyId::new(name),
            announcement: BasisAnnouncement::own(4, PartyId::new(name), basis),
        }
    }

    #[test]
    fn share_ready_requests_measurement() {
        let mut m = machine("Alice", Topology::FullMesh, Basis::Y);
        let actions = m.handle(PartyEvent::ShareReady).unwrap();

        assert_eq!(actions, vec![PartyAction::Measure { basis: Basis::Y }]);
        assert_eq!(m.state(), RoundState::Measure);
    }

    #[test]
    fn mesh_party_broadcasts_then_decides() {
        let mut m = machine("Alice", Topology::FullMesh, Basis::X);
        m.handle(PartyEvent::ShareReady).unwrap();

        let sends = m.handle(PartyEvent::Measured(Outcome::One)).unwrap();
        assert_eq!(sends.len(), 2);
        assert_eq!(m.state(), RoundState::CollectBases);

        assert!(m.handle(own("Bob", Basis::Y)).unwrap().is_empty());
        let actions = m.handle(own("Charlie", Basis::Y)).unwrap();

        let [PartyAction::Decided(report)] = actions.as_slice() else {
            panic!("expected a decision, got {actions:?}");
        };
        assert_eq!(report.outcome, Outcome::One);
        assert_eq!(report.bases.len(), 3);
        assert!(report.is_valid());
        assert_eq!(m.state(), RoundState::Terminal);
    }

    #[test]
    fn early_announcements_are_buffered() {
        let mut m = machine("Bob", Topology::FullMesh, Basis::X);

        assert!(m.handle(own("Alice", Basis::X)).unwrap().is_empty());
        assert!(m.handle(own("Charlie", Basis::X)).unwrap().is_empty());
        assert_eq!(m.pending_len(), 2);

        m.handle(PartyEvent::ShareReady).unwrap();
        let actions = m.handle(PartyEvent::Measured(Outcome::Zero)).unwrap();

        assert_eq!(actions.len(), 3);
        assert!(matches!(actions.last(), Some(PartyAction::Decided(_))));
    }

    #[test]
    fn conflicting_basis_is_a_violation() {
        let mut m = machine("Alice", Topology::FullMesh, Basis::X);
        m.handle(PartyEvent::ShareReady).unwrap();
        m.handle(PartyEvent::Measured(Outcome::Zero)).unwrap();

        let lie = PartyEvent::AnnouncementReceived {
            from: PartyId::new("Bob"),
            announcement: BasisAnnouncement::relay(
                4,
                [(PartyId::new("Bob"), Basis::X), (PartyId::new("Alice"), Basis::Y)].into(),
            ),
        };
        assert_eq!(m.handle(lie), Err(ProtocolError::ConflictingBasis(PartyId::new("Alice"))));
    }

    #[test]
    fn wrong_round_is_rejected() {
        let mut m = machine("Alice", Topology::FullMesh, Basis::X);
        let event = PartyEvent::AnnouncementReceived {
            from: PartyId::new("Bob"),
            announcement: BasisAnnouncement::own(5, PartyId::new("Bob"), Basis::X),
        };
        assert_eq!(m.handle(event), Err(ProtocolError::RoundMismatch { expected: 4, actual: 5 }));
    }

    #[test]
    fn non_peer_sender_is_rejected() {
        let hub = Topology::Coordinator { hub: PartyId::new("Bob") };
        let mut m = machine("Charlie", hub, Basis::X);
        assert_eq!(
            m.handle(own("Alice", Basis::X)),
            Err(ProtocolError::UnknownSender(PartyId::new("Alice")))
        );
    }

    #[test]
    fn stranger_in_announcement_is_rejected() {
        let mut m = machine("Alice", Topology::FullMesh, Basis::X);
        let event = PartyEvent::AnnouncementReceived {
            from: PartyId::new("Bob"),
            announcement: BasisAnnouncement::relay(
                4,
                [(PartyId::new("Bob"), Basis::X), (PartyId::new("Mallory"), Basis::Y)].into(),
            ),
        };
        assert_eq!(m.handle(event), Err(ProtocolError::UnknownParty(PartyId::new("Mallory"))));
    }

    #[test]
    fn out_of_order_events_are_rejected() {
        let mut m = machine("Alice", Topology::FullMesh, Basis::X);
        assert_eq!(
            m.handle(PartyEvent::Measured(Outcome::One)),
            Err(ProtocolError::UnexpectedEvent { event: "Measured", state: "AwaitEntanglement" })
        );
    }

    #[test]
    fn coordinator_hub_relays_once_complete() {
        let hub = Topology::Coordinator { hub: PartyId::new("Bob") };
        let mut m = machine("Bob", hub, Basis::Y);
        m.handle(PartyEvent::ShareReady).unwrap();

        assert!(m.handle(PartyEvent::Measured(Outcome::Zero)).unwrap().is_empty());
        assert!(m.handle(own("Alice", Basis::X)).unwrap().is_empty());

        let actions = m.handle(own("Charlie", Basis::Y)).unwrap();
        let relays: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                PartyAction::Send { to, announcement } => Some((to.as_str(), announcement.len())),
                _ => None,
            })
            .collect();

        assert_eq!(relays, vec![("Alice", 3), ("Charlie", 3)]);
        assert!(matches!(actions.last(), Some(PartyAction::Decided(_))));
    }

    #[test]
    fn chain_middle_forwards_then_returns() {
        let mut m = machine("Bob", Topology::Chain, Basis::X);
        m.handle(PartyEvent::ShareReady).unwrap();
        assert!(m.handle(PartyEvent::Measured(Outcome::One)).unwrap().is_empty());

        let forward = m.handle(own("Alice", Basis::Y)).unwrap();
        let [PartyAction::Send { to, announcement }] = forward.as_slice() else {
            panic!("expected a forward, got {forward:?}");
        };
        assert_eq!(to.as_str(), "Charlie");
        assert_eq!(announcement.len(), 2);

        let full = PartyEvent::AnnouncementReceived {
            from: PartyId::new("Charlie"),
            announcement: BasisAnnouncement::relay(
                4,
                [
                    (PartyId::new("Alice"), Basis::Y),
                    (PartyId::new("Bob"), Basis::X),
                    (PartyId::new("Charlie"), Basis::Y),
                ]
                .into(),
            ),
        };
        let back = m.handle(full).unwrap();

        assert_eq!(back.len(), 2);
        assert!(matches!(&back[0], PartyAction::Send { to, .. } if to.as_str() == "Alice"));
        assert!(matches!(&back[1], PartyAction::Decided(_)));
    }

    #[test]
    fn terminal_rejects_further_announcements() {
        let mut m = machine("Alice", Topology::FullMesh, Basis::X);
        m.handle(PartyEvent::ShareReady).unwrap();
        m.handle(PartyEvent::Measured(Outcome::Zero)).unwrap();
        m.handle(own("Bob", Basis::X)).unwrap();
        m.handle(own("Charlie", Basis::X)).unwrap();

        assert!(matches!(
            m.handle(own("Bob", Basis::X)),
            Err(ProtocolError::UnexpectedEvent { state: "Terminal", .. })
        ));
    }
}
