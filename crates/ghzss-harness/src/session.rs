//! Session runner.
//!
//! Rounds run strictly one after another. Within a round every party runs
//! as its own task over a fresh in-memory network; the round ends when all
//! of them reach `Terminal`, or is excluded if one fails or the round
//! outlives `round_timeout`.
//!
//! ```text
//! for round in 0..rounds:
//!   ├─ abort requested? stop
//!   ├─ spawn N drivers over a fresh ChannelTransport network
//!   ├─ join (bounded by round_timeout)
//!   ├─ RoundRecord::from_reports → evaluate
//!   └─ StatsAggregator + observers
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use ghzss_core::{
    ConfigError, NoiseConfig, Party, PartyDriver, PartyReport, ProtocolError, RoundRecord,
    RoundResult, Roster, SessionStatistics, StatsAggregator, derive_seed, evaluate,
};
use ghzss_proto::PartyId;
use tokio::{sync::Mutex, task::JoinSet};

use crate::{
    channel::ChannelTransport,
    config::SessionConfig,
    error::{RoundFailure, SessionError},
    quantum::SimQuantumLayer,
    sim_env::SimEnv,
};

pub(crate) type SimDriver = PartyDriver<SimEnv, Arc<SimQuantumLayer>>;

/// Per-round introspection hook.
pub trait RoundObserver: Send {
    /// Called for every evaluated round.
    fn on_round(&mut self, record: &RoundRecord, result: &RoundResult);

    /// Called for every excluded round.
    fn on_excluded(&mut self, _round: u64, _failure: &RoundFailure) {}
}

impl<F> RoundObserver for F
where
    F: FnMut(&RoundRecord, &RoundResult) + Send,
{
    fn on_round(&mut self, record: &RoundRecord, result: &RoundResult) {
        self(record, result);
    }
}

/// Stops a running session at the next round boundary.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    aborted: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Request a stop. The round in flight still runs to completion.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Has a stop been requested?
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// A configured session.
pub struct Session {
    config: SessionConfig,
    observers: Vec<Box<dyn RoundObserver>>,
    handle: SessionHandle,
}

impl Session {
    /// Session for `config`. Nothing is validated until it runs.
    pub fn new(config: SessionConfig) -> Self {
        Self { config, observers: Vec::new(), handle: SessionHandle::default() }
    }

    /// Add an observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl RoundObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Handle for aborting this session from elsewhere.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Configuration this session runs.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run on a fresh single-threaded runtime with a paused clock, so
    /// latencies and timeouts cost no wall time.
    ///
    /// Must not be called from within a tokio runtime; use
    /// [`Session::run_async`] there.
    pub fn run(self) -> Result<SessionStatistics, SessionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()?;
        runtime.block_on(self.run_async())
    }

    /// Run on the current runtime.
    pub async fn run_async(mut self) -> Result<SessionStatistics, SessionError> {
        let roster = Arc::new(self.config.validate()?);
        let root = SimEnv::new(self.config.seed);
        let quantum = Arc::new(
            SimQuantumLayer::new(Arc::clone(&roster), root.fork("quantum"))
                .with_share_latency(self.config.share_latency),
        );
        let drivers = self.drivers(&roster, &root, &quantum)?;

        tracing::info!(
            seed = self.config.seed,
            parties = roster.len(),
            rounds = self.config.rounds,
            topology = %self.config.topology,
            "session starting"
        );

        let mut stats = StatsAggregator::new();
        for round in 0..self.config.rounds {
            if self.handle.is_aborted() {
                tracing::info!(round, "session aborted");
                break;
            }

            let outcome = match self.run_round(round, &roster, &root, &drivers).await {
                Ok(record) => evaluate(&record, roster.dealer())
                    .map(|result| (record, result))
                    .map_err(|e| RoundFailure::Record(ProtocolError::from(e))),
                Err(failure) => {
                    quantum.discard(round);
                    Err(failure)
                },
            };

            match outcome {
                Ok((record, result)) => {
                    trace_round(&record, &result);
                    stats.record(&result);
                    stats.record_bases(&record.bases());
                    for observer in &mut self.observers {
                        observer.on_round(&record, &result);
                    }
                },
                Err(failure) => {
                    let violation = failure.is_violation();
                    tracing::warn!(round, violation, %failure, "round excluded");
                    stats.record_excluded();
                    for observer in &mut self.observers {
                        observer.on_excluded(round, &failure);
                    }
                },
            }
        }

        let summary = stats.summary();
        tracing::info!(
            total = summary.total_rounds,
            valid = summary.valid_rounds,
            excluded = summary.excluded_rounds,
            qber = %summary.qber,
            key_rate = %summary.key_rate,
            secret_sharing_rate = %summary.secret_sharing_rate,
            "session finished"
        );
        Ok(summary)
    }

    fn drivers(
        &self,
        roster: &Arc<Roster>,
        root: &SimEnv,
        quantum: &Arc<SimQuantumLayer>,
    ) -> Result<Vec<Arc<Mutex<SimDriver>>>, SessionError> {
        roster
            .parties()
            .map(|id| {
                let driver = build_driver(&self.config, roster, root, quantum, id)?;
                Ok(Arc::new(Mutex::new(driver)))
            })
            .collect()
    }

    async fn run_round(
        &self,
        round: u64,
        roster: &Roster,
        root: &SimEnv,
        drivers: &[Arc<Mutex<SimDriver>>],
    ) -> Result<RoundRecord, RoundFailure> {
        tracing::debug!(round, "round starting");

        let transports = ChannelTransport::network(roster, self.config.latency, |p| {
            root.fork(&format!("link/{p}/{round}"))
        });

        let mut tasks = JoinSet::new();
        for (driver, mut transport) in drivers.iter().map(Arc::clone).zip(transports) {
            tasks.spawn(async move {
                let mut driver = driver.lock().await;
                let party = driver.id().to_string();
                driver
                    .run_round(round, &mut transport)
                    .await
                    .map_err(|error| RoundFailure::Protocol { party, error })
            });
        }

        let collected = tokio::time::timeout(self.config.round_timeout, collect(&mut tasks)).await;
        tasks.shutdown().await;

        let reports = collected.map_err(|_| RoundFailure::Timeout)??;
        RoundRecord::from_reports(round, &roster.to_vec(), reports).map_err(RoundFailure::Record)
    }
}

async fn collect(
    tasks: &mut JoinSet<Result<PartyReport, RoundFailure>>,
) -> Result<Vec<PartyReport>, RoundFailure> {
    let mut reports = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(failure)) => return Err(failure),
            Err(err) => return Err(RoundFailure::Task(err.to_string())),
        }
    }
    Ok(reports)
}

/// Driver for `id` with its configured policy and noise.
pub(crate) fn build_driver(
    config: &SessionConfig,
    roster: &Arc<Roster>,
    root: &SimEnv,
    quantum: &Arc<SimQuantumLayer>,
    id: &PartyId,
) -> Result<SimDriver, SessionError> {
    let party = Party::new(id, roster, &config.topology)
        .ok_or_else(|| ConfigError::UnknownParty(id.clone()))?;
    let noise = config.noise.pipeline_for(id, party.role(), derive_seed(config.seed, "noise"))?;

    Ok(PartyDriver::new(
        root.fork(&format!("party/{id}")),
        party,
        Arc::clone(roster),
        config.topology.clone(),
        Arc::clone(quantum),
    )
    .with_policy(config.policy_for(id))
    .with_noise(noise))
}

fn trace_round(record: &RoundRecord, result: &RoundResult) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let parties: Vec<String> = record.iter().map(|(p, b, o)| format!("{p}={b}/{o}")).collect();
    tracing::debug!(
        round = record.round(),
        parties = %parties.join(" "),
        valid = result.valid,
        parity_ok = ?result.parity_ok,
        reconstructed = ?result.reconstructed_secret.map(|o| o.as_bit()),
        dealer = result.dealer_outcome.as_bit(),
        "round evaluated"
    );
}

/// Run a session with default settings for everything but the parties, the
/// round count and the noise.
pub fn run_session(
    dealer: impl Into<PartyId>,
    recipients: impl IntoIterator<Item = PartyId>,
    num_rounds: u64,
    noise: NoiseConfig,
) -> Result<SessionStatistics, SessionError> {
    let config =
        SessionConfig { rounds: num_rounds, noise, ..SessionConfig::with_parties(dealer, recipients) };
    Session::new(config).run()
}
