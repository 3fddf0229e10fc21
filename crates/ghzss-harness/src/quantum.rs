//! Ideal GHZ source.
//!
//! Samples measurement outcomes of the state |0…0⟩ + |1…1⟩ in X/Y bases
//! exactly, without a state vector. For that state any N−1 outcomes are
//! uniformly random whatever the bases. The last outcome is uniform too when
//! the Y count is odd, and otherwise fixed by the parity law
//! `XOR(all) = (y / 2) mod 2`. So outcomes are drawn uniformly in
//! measurement order, and only the last qubit of an even-Y round is forced.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use ghzss_core::{Environment, QuantumError, QuantumLayer, Roster, ShareHandle, sifting};
use ghzss_proto::{Basis, Outcome, PartyId};

use crate::{config::LatencyRange, sim_env::SimEnv};

#[derive(Debug, Default)]
struct RoundShares {
    delivered: BTreeSet<PartyId>,
    measured: BTreeMap<PartyId, (Basis, Outcome)>,
}

/// Rounds retire almost in order, so retirement is a low-water mark plus the
/// few rounds retired ahead of it.
#[derive(Debug, Default)]
struct State {
    rounds: BTreeMap<u64, RoundShares>,
    retired_below: u64,
    retired_ahead: BTreeSet<u64>,
}

impl State {
    fn is_retired(&self, round: u64) -> bool {
        round < self.retired_below || self.retired_ahead.contains(&round)
    }

    fn retire(&mut self, round: u64) {
        self.rounds.remove(&round);
        if round < self.retired_below {
            return;
        }
        self.retired_ahead.insert(round);
        while self.retired_ahead.remove(&self.retired_below) {
            self.retired_below += 1;
        }
    }
}

/// Shared ideal-GHZ source for all parties of a session.
#[derive(Debug)]
pub struct SimQuantumLayer {
    roster: Arc<Roster>,
    env: SimEnv,
    share_latency: LatencyRange,
    state: Mutex<State>,
}

impl SimQuantumLayer {
    /// Source for `roster` drawing from `env`.
    pub fn new(roster: Arc<Roster>, env: SimEnv) -> Self {
        Self { roster, env, share_latency: LatencyRange::zero(), state: Mutex::default() }
    }

    /// Delay each share delivery by a sample from `latency`.
    #[must_use]
    pub fn with_share_latency(mut self, latency: LatencyRange) -> Self {
        self.share_latency = latency;
        self
    }

    /// Rounds with live state. Zero between rounds of a healthy session.
    pub fn live_rounds(&self) -> usize {
        self.lock().rounds.len()
    }

    /// Drop whatever is left of `round`, e.g. after a timeout.
    pub fn discard(&self, round: u64) {
        self.lock().retire(round);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn random_outcome(&self) -> Outcome {
        Outcome::from_bool(self.env.random_u64() & 1 == 1)
    }

    fn sample(&self, measured: &BTreeMap<PartyId, (Basis, Outcome)>, basis: Basis) -> Outcome {
        if measured.len() + 1 < self.roster.len() {
            return self.random_outcome();
        }

        let y = sifting::y_count(measured.values().map(|(b, _)| b)) + usize::from(basis.is_y());
        if y % 2 == 1 {
            return self.random_outcome();
        }

        sifting::expected_parity(y) ^ sifting::xor_all(measured.values().map(|(_, o)| o))
    }
}

#[async_trait]
impl QuantumLayer for SimQuantumLayer {
    async fn await_share_ready(
        &self,
        party: &PartyId,
        round: u64,
    ) -> Result<ShareHandle, QuantumError> {
        if !self.roster.contains(party) {
            return Err(QuantumError::NoShare { party: party.clone(), round });
        }

        {
            let mut state = self.lock();
            if state.is_retired(round) {
                return Err(QuantumError::StaleHandle(round));
            }
            state.rounds.entry(round).or_default().delivered.insert(party.clone());
        }

        let delay = self.share_latency.sample(&self.env);
        if !delay.is_zero() {
            self.env.sleep(delay).await;
        }

        Ok(ShareHandle::new(party.clone(), round))
    }

    async fn measure(&self, handle: ShareHandle, basis: Basis) -> Result<Outcome, QuantumError> {
        let round = handle.round();
        let party = handle.party().clone();

        let mut state = self.lock();
        let shares = state.rounds.get_mut(&round).ok_or(QuantumError::StaleHandle(round))?;

        if !shares.delivered.contains(&party) {
            return Err(QuantumError::NoShare { party, round });
        }
        if shares.measured.contains_key(&party) {
            return Err(QuantumError::AlreadyMeasured { party, round });
        }

        let outcome = self.sample(&shares.measured, basis);
        shares.measured.insert(party, (basis, outcome));

        if shares.measured.len() == self.roster.len() {
            state.retire(round);
        }

        Ok(outcome)
    }
}
