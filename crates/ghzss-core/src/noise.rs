//! Outcome corruption: channel noise and intercept-resend eavesdropping.
//!
//! A noise model sits between a party's true measurement and the outcome it
//! reports. Models are applied per party (per quantum link); independent
//! flips on different links compose by XOR, so two links flipping in the
//! same round cancel out in the parity check.

use ghzss_proto::{Basis, Outcome, PartyId, Role};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::{env::derive_seed, error::ConfigError};

/// Corrupts a single party's outcome.
///
/// Models hold no state across rounds other than their own RNG stream.
pub trait NoiseModel: Send {
    /// Reported outcome for a measurement of `outcome` in `basis`.
    fn apply(&mut self, outcome: Outcome, basis: Basis) -> Outcome;

    /// Probability that `apply` flips the outcome, assuming the party's basis
    /// is uniform.
    fn flip_probability(&self) -> f64;
}

/// Leaves outcomes untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNoise;

impl NoiseModel for NoNoise {
    fn apply(&mut self, outcome: Outcome, _basis: Basis) -> Outcome {
        outcome
    }

    fn flip_probability(&self) -> f64 {
        0.0
    }
}

/// Flips each outcome independently with probability `level`.
#[derive(Debug, Clone)]
pub struct ChannelNoise {
    level: f64,
    rng: ChaCha8Rng,
}

impl ChannelNoise {
    /// New channel noise. `level` must lie in `[0, 1]`.
    pub fn new(level: f64, seed: u64) -> Result<Self, ConfigError> {
        check_level(level)?;
        Ok(Self { level, rng: ChaCha8Rng::seed_from_u64(seed) })
    }
}

impl NoiseModel for ChannelNoise {
    fn apply(&mut self, outcome: Outcome, _basis: Basis) -> Outcome {
        if self.rng.gen_bool(self.level) { outcome.flip() } else { outcome }
    }

    fn flip_probability(&self) -> f64 {
        self.level
    }
}

/// How the eavesdropper picks her measurement basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EveStrategy {
    /// Uniformly random X or Y every round.
    #[default]
    Random,
    /// Always the same basis.
    Fixed(Basis),
}

/// Intercept-resend attack on one quantum link.
///
/// The eavesdropper measures the qubit in her own basis and resends the
/// result. When her basis differs from the victim's, the victim's outcome is
/// randomised, i.e. flipped with probability 1/2.
#[derive(Debug, Clone)]
pub struct InterceptResend {
    strategy: EveStrategy,
    rng: ChaCha8Rng,
}

impl InterceptResend {
    /// New attacker with its own RNG stream.
    pub fn new(strategy: EveStrategy, seed: u64) -> Self {
        Self { strategy, rng: ChaCha8Rng::seed_from_u64(seed) }
    }

    fn eve_basis(&mut self) -> Basis {
        match self.strategy {
            EveStrategy::Random => {
                if self.rng.gen_bool(0.5) {
                    Basis::Y
                } else {
                    Basis::X
                }
            },
            EveStrategy::Fixed(basis) => basis,
        }
    }
}

impl NoiseModel for InterceptResend {
    fn apply(&mut self, outcome: Outcome, basis: Basis) -> Outcome {
        let eve = self.eve_basis();
        if eve != basis && self.rng.gen_bool(0.5) { outcome.flip() } else { outcome }
    }

    fn flip_probability(&self) -> f64 {
        // Victim basis is uniform, so a fixed basis mismatches half the time
        // just like a random one.
        0.25
    }
}

/// Ordered chain of models applied to one party's outcome.
#[derive(Default)]
pub struct NoisePipeline {
    stages: Vec<Box<dyn NoiseModel>>,
}

impl NoisePipeline {
    /// Pipeline that leaves outcomes untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    #[must_use]
    pub fn with(mut self, model: impl NoiseModel + 'static) -> Self {
        self.stages.push(Box::new(model));
        self
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True if no stage is installed.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl NoiseModel for NoisePipeline {
    fn apply(&mut self, outcome: Outcome, basis: Basis) -> Outcome {
        self.stages.iter_mut().fold(outcome, |o, stage| stage.apply(o, basis))
    }

    fn flip_probability(&self) -> f64 {
        odd_flip_probability(self.stages.iter().map(|s| s.flip_probability()))
    }
}

impl std::fmt::Debug for NoisePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoisePipeline").field("stages", &self.stages.len()).finish()
    }
}

/// Probability that an odd number of independent flips happen.
///
/// Uses `P(odd) = (1 − Π(1 − 2pᵢ)) / 2`.
pub fn odd_flip_probability(probabilities: impl IntoIterator<Item = f64>) -> f64 {
    let product: f64 = probabilities.into_iter().map(|p| 2.0f64.mul_add(-p, 1.0)).product();
    (1.0 - product) / 2.0
}

fn check_level(level: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&level) { Ok(()) } else { Err(ConfigError::NoiseOutOfRange(level)) }
}

/// Intercept-resend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EavesdropperConfig {
    /// Recipients whose links are intercepted.
    pub targets: Vec<PartyId>,
    /// Basis selection strategy.
    pub strategy: EveStrategy,
}

/// Session-wide noise configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Per-link flip probability on every dealer-to-recipient link.
    pub channel_noise: f64,
    /// Optional intercept-resend attacker.
    pub eavesdropper: Option<EavesdropperConfig>,
}

impl NoiseConfig {
    /// No noise, no attacker.
    pub fn noiseless() -> Self {
        Self::default()
    }

    /// Channel noise only.
    pub fn with_channel_noise(level: f64) -> Self {
        Self { channel_noise: level, eavesdropper: None }
    }

    /// Add an intercept-resend attacker on the given recipients' links.
    #[must_use]
    pub fn with_eavesdropper(
        mut self,
        targets: impl IntoIterator<Item = PartyId>,
        strategy: EveStrategy,
    ) -> Self {
        self.eavesdropper =
            Some(EavesdropperConfig { targets: targets.into_iter().collect(), strategy });
        self
    }

    /// Check levels and targets against the session's parties.
    ///
    /// The dealer's share never leaves the dealer, so it cannot be targeted.
    pub fn validate(&self, recipients: &[PartyId]) -> Result<(), ConfigError> {
        check_level(self.channel_noise)?;
        if let Some(eve) = &self.eavesdropper {
            if let Some(bad) = eve.targets.iter().find(|t| !recipients.contains(t)) {
                return Err(ConfigError::InvalidTarget(bad.clone()));
            }
        }
        Ok(())
    }

    fn intercepts(&self, party: &PartyId) -> Option<EveStrategy> {
        self.eavesdropper.as_ref().filter(|eve| eve.targets.contains(party)).map(|eve| eve.strategy)
    }

    /// Build the noise pipeline for one party.
    ///
    /// Each stage gets its own stream derived from `seed` and the party name.
    pub fn pipeline_for(
        &self,
        party: &PartyId,
        role: Role,
        seed: u64,
    ) -> Result<NoisePipeline, ConfigError> {
        let mut pipeline = NoisePipeline::new();
        if role == Role::Dealer {
            return Ok(pipeline);
        }

        if self.channel_noise > 0.0 {
            let seed = derive_seed(seed, &format!("noise/{party}"));
            pipeline = pipeline.with(ChannelNoise::new(self.channel_noise, seed)?);
        }
        if let Some(strategy) = self.intercepts(party) {
            let seed = derive_seed(seed, &format!("eve/{party}"));
            pipeline = pipeline.with(InterceptResend::new(strategy, seed));
        }

        Ok(pipeline)
    }

    /// Expected QBER in the long run: the probability that an odd number of
    /// the recipients' links flip in a round.
    pub fn predicted_qber(&self, recipients: &[PartyId]) -> f64 {
        let per_link = recipients.iter().map(|r| {
            let eve = if self.intercepts(r).is_some() { 0.25 } else { 0.0 };
            odd_flip_probability([self.channel_noise, eve])
        });
        odd_flip_probability(per_link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipients() -> Vec<PartyId> {
        ["Bob", "Charlie"].map(PartyId::new).to_vec()
    }

    #[test]
    fn channel_noise_rejects_out_of_range_level() {
        assert!(matches!(ChannelNoise::new(1.5, 0), Err(ConfigError::NoiseOutOfRange(_))));
        assert!(matches!(ChannelNoise::new(-0.1, 0), Err(ConfigError::NoiseOutOfRange(_))));
    }

    #[test]
    fn full_channel_noise_always_flips() {
        let mut noise = ChannelNoise::new(1.0, 3).unwrap();
        for _ in 0..100 {
            assert_eq!(noise.apply(Outcome::Zero, Basis::X), Outcome::One);
        }
    }

    #[test]
    fn matching_fixed_basis_never_flips() {
        let mut eve = InterceptResend::new(EveStrategy::Fixed(Basis::Y), 9);
        for _ in 0..100 {
            assert_eq!(eve.apply(Outcome::One, Basis::Y), Outcome::One);
        }
    }

    #[test]
    fn odd_flip_probability_composes_by_xor() {
        assert!((odd_flip_probability([0.25]) - 0.25).abs() < 1e-12);
        assert!((odd_flip_probability([0.25, 0.25]) - 0.375).abs() < 1e-12);
        assert!((odd_flip_probability([0.5, 0.1]) - 0.5).abs() < 1e-12);
        assert!(odd_flip_probability([]).abs() < 1e-12);
    }

    #[test]
    fn dealer_pipeline_is_empty() {
        let config = NoiseConfig::with_channel_noise(0.2);
        let pipeline = config.pipeline_for(&PartyId::new("Alice"), Role::Dealer, 1).unwrap();
        assert!(pipeline.is_empty());
    }

    #[test]
    fn targeted_recipient_gets_both_stages() {
        let config = NoiseConfig::with_channel_noise(0.1)
            .with_eavesdropper([PartyId::new("Bob")], EveStrategy::Random);
        let bob = config.pipeline_for(&PartyId::new("Bob"), Role::Recipient, 1).unwrap();
        let charlie = config.pipeline_for(&PartyId::new("Charlie"), Role::Recipient, 1).unwrap();

        assert_eq!(bob.len(), 2);
        assert_eq!(charlie.len(), 1);
    }

    #[test]
    fn dealer_cannot_be_targeted() {
        let config =
            NoiseConfig::noiseless().with_eavesdropper([PartyId::new("Alice")], EveStrategy::Random);
        assert_eq!(
            config.validate(&recipients()),
            Err(ConfigError::InvalidTarget(PartyId::new("Alice")))
        );
    }

    #[test]
    fn predicted_qber_for_one_intercepted_link() {
        let config =
            NoiseConfig::noiseless().with_eavesdropper([PartyId::new("Bob")], EveStrategy::Random);
        assert!((config.predicted_qber(&recipients()) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn predicted_qber_for_two_intercepted_links() {
        let config = NoiseConfig::noiseless().with_eavesdropper(recipients(), EveStrategy::Random);
        assert!((config.predicted_qber(&recipients()) - 0.375).abs() < 1e-12);
    }
}
