//! Drivers for every party running concurrently over in-memory channels.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use ghzss_core::{
    Environment, Party, PartyDriver, PartyReport, QuantumError, QuantumLayer, Roster,
    ShareHandle, Topology, Transport, TransportError, derive_seed,
};
use ghzss_proto::{Basis, BasisAnnouncement, Outcome, PartyId};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::{sync::mpsc, task::JoinSet};

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

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.0.lock().unwrap().fill_bytes(buffer);
    }
}

/// Quantum layer whose outcomes are all zero. Enough to exercise routing.
struct ZeroQuantum;

#[async_trait]
impl QuantumLayer for ZeroQuantum {
    async fn await_share_ready(
        &self,
        party: &PartyId,
        round: u64,
    ) -> Result<ShareHandle, QuantumError> {
        Ok(ShareHandle::new(party.clone(), round))
    }

    async fn measure(&self, _handle: ShareHandle, _basis: Basis) -> Result<Outcome, QuantumError> {
        Ok(Outcome::Zero)
    }
}

struct MemTransport {
    me: PartyId,
    inbox: mpsc::UnboundedReceiver<(PartyId, BasisAnnouncement)>,
    peers: BTreeMap<PartyId, mpsc::UnboundedSender<(PartyId, BasisAnnouncement)>>,
}

#[async_trait]
impl Transport for MemTransport {
    async fn send(
        &mut self,
        to: &PartyId,
        announcement: BasisAnnouncement,
    ) -> Result<(), TransportError> {
        let tx = self.peers.get(to).ok_or_else(|| TransportError::UnknownPeer(to.clone()))?;
        tx.send((self.me.clone(), announcement))
            .map_err(|_| TransportError::Closed(to.to_string()))
    }

    async fn recv(&mut self) -> Result<(PartyId, BasisAnnouncement), TransportError> {
        self.inbox.recv().await.ok_or_else(|| TransportError::Closed(self.me.to_string()))
    }
}

fn transports(roster: &Roster) -> Vec<MemTransport> {
    let (senders, receivers): (BTreeMap<_, _>, Vec<_>) = roster
        .parties()
        .map(|p| {
            let (tx, rx) = mpsc::unbounded_channel();
            ((p.clone(), tx), (p.clone(), rx))
        })
        .unzip();

    receivers
        .into_iter()
        .map(|(me, inbox)| MemTransport { me, inbox, peers: senders.clone() })
        .collect()
}

async fn run(topology: Topology, rounds: u64) -> Vec<Vec<PartyReport>> {
    let roster = Arc::new(
        Roster::new("Alice", ["Bob", "Charlie", "Dave"].map(PartyId::new)).unwrap(),
    );
    let quantum = Arc::new(ZeroQuantum);

    let mut tasks = JoinSet::new();
    for mut transport in transports(&roster) {
        let party = Party::new(&transport.me, &roster, &topology).unwrap();
        let env = TestEnv::new(derive_seed(5, party.id().as_str()));
        let mut driver =
            PartyDriver::new(env, party, Arc::clone(&roster), topology.clone(), Arc::clone(&quantum));

        tasks.spawn(async move {
            let mut reports = Vec::new();
            for round in 0..rounds {
                reports.push(driver.run_round(round, &mut transport).await.unwrap());
            }
            reports
        });
    }

    let mut all = Vec::new();
    while let Some(reports) = tasks.join_next().await {
        all.push(reports.unwrap());
    }
    all.sort_by(|a, b| a[0].party.cmp(&b[0].party));
    all
}

fn assert_consistent(all: &[Vec<PartyReport>]) {
    for round in 0..all[0].len() {
        let view = &all[0][round].bases;
        assert_eq!(view.len(), 4);
        for reports in all {
            assert_eq!(&reports[round].bases, view, "round {round} views differ");
            assert_eq!(reports[round].bases[&reports[round].party], reports[round].basis);
        }
    }
}

#[tokio::test]
async fn every_topology_yields_the_same_views() {
    let mesh = run(Topology::FullMesh, 20).await;
    let hub = run(Topology::Coordinator { hub: PartyId::new("Bob") }, 20).await;
    let dealer_hub = run(Topology::Coordinator { hub: PartyId::new("Alice") }, 20).await;
    let chain = run(Topology::Chain, 20).await;

    for all in [&mesh, &hub, &dealer_hub, &chain] {
        assert_consistent(all);
    }
    assert_eq!(mesh, hub);
    assert_eq!(mesh, dealer_hub);
    assert_eq!(mesh, chain);
}
