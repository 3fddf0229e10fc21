//! Async driver for one party.
//!
//! Runs a fresh [`RoundMachine`] per round against the quantum layer and a
//! transport, executing the machine's actions as they come. The driver is
//! the only place where this party waits.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

use ghzss_proto::{BasisAnnouncement, PartyId, Role};

use crate::{
    env::Environment,
    error::{ProtocolError, QuantumError},
    machine::{BasisPolicy, PartyAction, PartyEvent, RoundMachine},
    noise::{NoiseModel, NoisePipeline},
    party::{Party, Roster},
    quantum::{QuantumLayer, ShareHandle},
    round::PartyReport,
    topology::Topology,
    transport::Transport,
};

/// Drives one party through successive rounds.
///
/// # Type Parameters
///
/// - `E`: Environment for basis choice
/// - `Q`: quantum layer the party measures against
pub struct PartyDriver<E: Environment, Q: QuantumLayer> {
    env: E,
    party: Party,
    roster: Arc<Roster>,
    topology: Topology,
    policy: BasisPolicy,
    noise: NoisePipeline,
    quantum: Q,
    stash: BTreeMap<u64, Vec<(PartyId, BasisAnnouncement)>>,
}

impl<E: Environment, Q: QuantumLayer> PartyDriver<E, Q> {
    /// New driver with a uniform basis policy and no noise.
    pub fn new(env: E, party: Party, roster: Arc<Roster>, topology: Topology, quantum: Q) -> Self {
        Self {
            env,
            party,
            roster,
            topology,
            policy: BasisPolicy::Uniform,
            noise: NoisePipeline::new(),
            quantum,
            stash: BTreeMap::new(),
        }
    }

    /// Replace the basis policy.
    #[must_use]
    pub fn with_policy(mut self, policy: BasisPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the noise pipeline applied to this party's outcomes.
    #[must_use]
    pub fn with_noise(mut self, noise: NoisePipeline) -> Self {
        self.noise = noise;
        self
    }

    /// This party's identity.
    pub fn id(&self) -> &PartyId {
        self.party.id()
    }

    /// This party's role.
    pub fn role(&self) -> Role {
        self.party.role()
    }

    /// Announcements held for rounds not yet started.
    pub fn stashed(&self) -> usize {
        self.stash.values().map(Vec::len).sum()
    }

    /// Run `round` to `Terminal` and return this party's report.
    ///
    /// Announcements for later rounds are stashed and replayed when that
    /// round starts. Announcements for earlier rounds are dropped.
    pub async fn run_round<T: Transport>(
        &mut self,
        round: u64,
        transport: &mut T,
    ) -> Result<PartyReport, ProtocolError> {
        self.stash.retain(|r, _| *r >= round);

        let mut machine = RoundMachine::new(
            self.env.clone(),
            self.party.clone(),
            Arc::clone(&self.roster),
            self.topology.clone(),
            self.policy,
            round,
        );

        let mut handle = Some(self.quantum.await_share_ready(self.party.id(), round).await?);
        tracing::trace!(party = %self.party.id(), round, "share ready");

        let mut queue: VecDeque<PartyAction> = machine.handle(PartyEvent::ShareReady)?.into();
        for (from, announcement) in self.stash.remove(&round).unwrap_or_default() {
            queue.extend(machine.handle(PartyEvent::AnnouncementReceived { from, announcement })?);
        }

        loop {
            while let Some(action) = queue.pop_front() {
                match action {
                    PartyAction::Measure { basis } => {
                        let share: ShareHandle =
                            handle.take().ok_or(QuantumError::AlreadyMeasured {
                                party: self.party.id().clone(),
                                round,
                            })?;
                        let raw = self.quantum.measure(share, basis).await?;
                        let reported = self.noise.apply(raw, basis);
                        if reported != raw {
                            tracing::trace!(party = %self.party.id(), round, "noise flip");
                        }
                        queue.extend(machine.handle(PartyEvent::Measured(reported))?);
                    },
                    PartyAction::Send { to, announcement } => {
                        transport.send(&to, announcement).await?;
                    },
                    PartyAction::Decided(report) => return Ok(report),
                }
            }

            let (from, announcement) = transport.recv().await?;
            match announcement.round.cmp(&round) {
                std::cmp::Ordering::Less => {
                    tracing::warn!(
                        party = %self.party.id(),
                        round,
                        stale = announcement.round,
                        %from,
                        "dropping stale announcement"
                    );
                },
                std::cmp::Ordering::Greater => {
                    self.stash.entry(announcement.round).or_default().push((from, announcement));
                },
                std::cmp::Ordering::Equal => {
                    queue.extend(
                        machine.handle(PartyEvent::AnnouncementReceived { from, announcement })?,
                    );
                },
            }
        }
    }
}
