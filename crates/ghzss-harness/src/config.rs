//! Session configuration.

use std::{collections::BTreeMap, time::Duration};

use ghzss_core::{BasisPolicy, ConfigError, Environment, NoiseConfig, Roster, Topology};
use ghzss_proto::{Basis, PartyId};
use serde::{Deserialize, Serialize};

/// Uniform delay range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyRange {
    /// Shortest delay.
    pub min: Duration,
    /// Longest delay.
    pub max: Duration,
}

impl LatencyRange {
    /// Range from `min` to `max`.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// No delay at all.
    pub fn zero() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Reject a range whose `max` is below its `min`.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidLatency`, tagged with `name`.
    pub fn check(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.max < self.min {
            return Err(ConfigError::InvalidLatency { name, min: self.min, max: self.max });
        }
        Ok(())
    }

    /// Draw a delay from `min..=max`. Requires `min <= max`, which
    /// [`SessionConfig::validate`] enforces; a fixed range draws no randomness.
    pub fn sample(&self, env: &impl Environment) -> Duration {
        if self.max == self.min {
            return self.min;
        }
        self.min + self.max.saturating_sub(self.min).mul_f64(env.random_unit())
    }
}

impl Default for LatencyRange {
    fn default() -> Self {
        Self::new(Duration::from_millis(1), Duration::from_millis(5))
    }
}

/// Everything needed to run a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// The dealer.
    pub dealer: PartyId,
    /// Recipients, in chain order.
    pub recipients: Vec<PartyId>,
    /// Rounds to run.
    pub rounds: u64,
    /// Channel noise and eavesdropper.
    pub noise: NoiseConfig,
    /// Basis exchange routing.
    pub topology: Topology,
    /// Session seed. Every random stream of the session derives from it.
    pub seed: u64,
    /// Per-announcement delivery delay.
    pub latency: LatencyRange,
    /// Delay before a party's share is ready.
    pub share_latency: LatencyRange,
    /// Rounds that take longer are excluded.
    pub round_timeout: Duration,
    /// Parties that always measure in a fixed basis.
    pub basis_overrides: BTreeMap<PartyId, Basis>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dealer: PartyId::new("Alice"),
            recipients: vec![PartyId::new("Bob"), PartyId::new("Charlie")],
            rounds: 100,
            noise: NoiseConfig::noiseless(),
            topology: Topology::FullMesh,
            seed: 0,
            latency: LatencyRange::default(),
            share_latency: LatencyRange::default(),
            round_timeout: Duration::from_secs(10),
            basis_overrides: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    /// Default configuration with the given parties.
    pub fn with_parties(
        dealer: impl Into<PartyId>,
        recipients: impl IntoIterator<Item = PartyId>,
    ) -> Self {
        Self {
            dealer: dealer.into(),
            recipients: recipients.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Check the configuration and resolve the roster.
    ///
    /// # Errors
    ///
    /// Every failure is fatal for the session and never retried.
    pub fn validate(&self) -> Result<Roster, ConfigError> {
        let roster = Roster::new(self.dealer.clone(), self.recipients.iter().cloned())?;

        if self.rounds == 0 {
            return Err(ConfigError::NoRounds);
        }
        self.noise.validate(roster.recipients())?;
        self.topology.validate(&roster)?;
        self.latency.check("latency")?;
        self.share_latency.check("share latency")?;
        if let Some(stranger) = self.basis_overrides.keys().find(|p| !roster.contains(p)) {
            return Err(ConfigError::UnknownParty(stranger.clone()));
        }

        Ok(roster)
    }

    /// Basis policy of `party`.
    pub fn policy_for(&self, party: &PartyId) -> BasisPolicy {
        self.basis_overrides.get(party).map_or(BasisPolicy::Uniform, |b| BasisPolicy::Fixed(*b))
    }

    /// Expected long-run QBER under the configured noise.
    pub fn predicted_qber(&self) -> f64 {
        self.noise.predicted_qber(&self.recipients)
    }
}

#[cfg(test)]
mod tests {
    use ghzss_core::EveStrategy;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let roster = SessionConfig::default().validate().unwrap();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.dealer().as_str(), "Alice");
    }

    #[test]
    fn dealer_listed_as_recipient_is_rejected() {
        let config = SessionConfig::with_parties("Alice", [PartyId::new("Alice")]);
        assert_eq!(config.validate(), Err(ConfigError::DuplicateParty(PartyId::new("Alice"))));
    }

    #[test]
    fn lone_dealer_is_rejected() {
        let config = SessionConfig::with_parties("Alice", []);
        assert_eq!(config.validate(), Err(ConfigError::TooFewParties(1)));
    }

    #[test]
    fn bad_noise_is_rejected() {
        let config =
            SessionConfig { noise: NoiseConfig::with_channel_noise(2.0), ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::NoiseOutOfRange(2.0)));
    }

    #[test]
    fn unknown_hub_is_rejected() {
        let config = SessionConfig {
            topology: Topology::Coordinator { hub: PartyId::new("Dave") },
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::UnknownCoordinator(PartyId::new("Dave"))));
    }

    #[test]
    fn zero_rounds_is_rejected() {
        let config = SessionConfig { rounds: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::NoRounds));
    }

    #[test]
    fn inverted_latency_is_rejected() {
        let (short, long) = (Duration::from_millis(5), Duration::from_millis(10));

        let config = SessionConfig { latency: LatencyRange::new(long, short), ..Default::default() };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLatency { name: "latency", min: long, max: short })
        );

        let config =
            SessionConfig { share_latency: LatencyRange::new(long, short), ..Default::default() };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLatency { name: "share latency", .. })
        ));

        let fixed = SessionConfig { latency: LatencyRange::new(long, long), ..Default::default() };
        assert!(fixed.validate().is_ok());
    }

    #[test]
    fn predicted_qber_uses_recipient_links() {
        let config = SessionConfig {
            noise: NoiseConfig::noiseless()
                .with_eavesdropper([PartyId::new("Bob")], EveStrategy::Random),
            ..Default::default()
        };
        assert!((config.predicted_qber() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn latency_samples_stay_in_range() {
        let env = crate::SimEnv::new(4);
        let range = LatencyRange::default();
        for _ in 0..1000 {
            let d = range.sample(&env);
            assert!(d >= range.min && d <= range.max);
        }
        assert_eq!(LatencyRange::zero().sample(&env), Duration::ZERO);
    }
}
