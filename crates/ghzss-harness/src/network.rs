//! Networked sessions over a simulated TCP network.
//!
//! Every party is a turmoil host running all rounds back to back with its
//! own [`SimTransport`]. Unlike the in-memory runner, parties are not held
//! in lockstep: a fast party may start round `r + 1` while a slow one is
//! still in round `r`, and the driver stashes the early announcements.
//!
//! Reports are collected per round and evaluated once the simulation ends.
//! A round is excluded if any party failed or timed out in it.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use ghzss_core::{PartyReport, RoundRecord, Roster, SessionStatistics, StatsAggregator, evaluate};
use ghzss_proto::PartyId;
use tokio::sync::Barrier;

use crate::{
    config::SessionConfig,
    error::{RoundFailure, SessionError},
    quantum::SimQuantumLayer,
    session::{SimDriver, build_driver},
    sim_env::SimEnv,
    sim_transport::SimTransport,
};

/// Port every party listens on.
pub const PORT: u16 = 7400;

#[derive(Debug, Default)]
struct Ledger {
    reports: BTreeMap<u64, Vec<PartyReport>>,
    failures: BTreeMap<u64, RoundFailure>,
}

type SharedLedger = Arc<Mutex<Ledger>>;

/// Run `config` with every party on its own simulated host.
///
/// `config.latency` becomes the network's message latency and the session
/// seed drives turmoil's RNG, so a run replays exactly from its seed.
pub fn run_networked_session(config: &SessionConfig) -> Result<SessionStatistics, SessionError> {
    let roster = Arc::new(config.validate()?);
    let root = SimEnv::new(config.seed);
    let quantum = Arc::new(
        SimQuantumLayer::new(Arc::clone(&roster), root.fork("quantum"))
            .with_share_latency(config.share_latency),
    );
    let ledger = SharedLedger::default();
    let finished = Arc::new(Barrier::new(roster.len()));

    let mut sim = turmoil::Builder::new()
        .simulation_duration(simulation_budget(config))
        .min_message_latency(config.latency.min)
        .max_message_latency(config.latency.max)
        .rng_seed(config.seed)
        .build();

    for id in roster.parties() {
        let driver = build_driver(config, &roster, &root, &quantum, id)?;
        let host = PartyHost {
            driver,
            peers: roster.parties().cloned().collect(),
            rounds: config.rounds,
            round_timeout: config.round_timeout,
            quantum: Arc::clone(&quantum),
            ledger: Arc::clone(&ledger),
            finished: Arc::clone(&finished),
        };
        sim.client(id.as_str(), host.run());
    }

    tracing::info!(
        seed = config.seed,
        parties = roster.len(),
        rounds = config.rounds,
        topology = %config.topology,
        "networked session starting"
    );
    sim.run().map_err(|e| SessionError::Simulation(e.to_string()))?;

    let ledger = std::mem::take(&mut *ledger.lock().unwrap_or_else(PoisonError::into_inner));
    let summary = tally(config.rounds, &roster, ledger);
    tracing::info!(
        total = summary.total_rounds,
        valid = summary.valid_rounds,
        excluded = summary.excluded_rounds,
        qber = %summary.qber,
        "networked session finished"
    );
    Ok(summary)
}

struct PartyHost {
    driver: SimDriver,
    peers: Vec<PartyId>,
    rounds: u64,
    round_timeout: Duration,
    quantum: Arc<SimQuantumLayer>,
    ledger: SharedLedger,
    finished: Arc<Barrier>,
}

impl PartyHost {
    async fn run(mut self) -> turmoil::Result {
        let me = self.driver.id().clone();
        let mut transport = SimTransport::bind(me.clone(), PORT, self.peers.clone()).await?;

        for round in 0..self.rounds {
            let attempt = self.driver.run_round(round, &mut transport);
            let outcome = tokio::time::timeout(self.round_timeout, attempt).await;

            let failure = match outcome {
                Ok(Ok(report)) => {
                    self.ledger().reports.entry(round).or_default().push(report);
                    continue;
                },
                Ok(Err(error)) => {
                    tracing::warn!(party = %me, round, %error, "round failed");
                    RoundFailure::Protocol { party: me.to_string(), error }
                },
                Err(_) => {
                    tracing::warn!(party = %me, round, "round timed out");
                    RoundFailure::Timeout
                },
            };
            // The round is excluded whatever the others do.
            self.quantum.discard(round);
            self.ledger().failures.entry(round).or_insert(failure);
        }

        tracing::debug!(party = %me, sent = transport.sent(), "all rounds done");
        // Peers may still be reading from our streams.
        self.finished.wait().await;
        Ok(())
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn simulation_budget(config: &SessionConfig) -> Duration {
    let rounds = u32::try_from(config.rounds).unwrap_or(u32::MAX);
    config.round_timeout.saturating_mul(rounds).saturating_add(Duration::from_secs(60))
}

fn tally(rounds: u64, roster: &Roster, mut ledger: Ledger) -> SessionStatistics {
    let parties = roster.to_vec();
    let mut stats = StatsAggregator::new();

    for round in 0..rounds {
        let reports = ledger.reports.remove(&round).unwrap_or_default();
        let evaluated = match ledger.failures.remove(&round) {
            Some(failure) => Err(failure),
            None => RoundRecord::from_reports(round, &parties, reports)
                .map_err(RoundFailure::Record)
                .and_then(|record| {
                    evaluate(&record, roster.dealer())
                        .map(|result| (record, result))
                        .map_err(|e| RoundFailure::Record(e.into()))
                }),
        };

        match evaluated {
            Ok((record, result)) => {
                stats.record(&result);
                stats.record_bases(&record.bases());
            },
            Err(failure) => {
                tracing::debug!(round, %failure, "round excluded");
                stats.record_excluded();
            },
        }
    }

    stats.summary()
}
