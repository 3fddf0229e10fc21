//! Experiments built from whole sessions.
//!
//! Each experiment runs ordinary sessions that differ in one parameter and
//! share everything else, the seed included.

use std::fmt;

use ghzss_core::{EveStrategy, NoiseConfig, SessionStatistics};
use ghzss_proto::PartyId;
use serde::Serialize;

use crate::{config::SessionConfig, error::SessionError, session::Session};

/// Names handed out to generated recipients, in order.
const RECIPIENT_NAMES: [&str; 8] =
    ["Bob", "Charlie", "Dave", "Erin", "Frank", "Grace", "Heidi", "Ivan"];

/// Baseline versus attacked session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EavesdroppingComparison {
    /// Intercepted recipients.
    pub targets: Vec<PartyId>,
    /// Session without the eavesdropper.
    pub baseline: SessionStatistics,
    /// Same session with the eavesdropper.
    pub attacked: SessionStatistics,
    /// Closed-form QBER expected under attack.
    pub predicted_qber: f64,
}

impl EavesdroppingComparison {
    /// QBER rise in percentage points, if both sessions had valid rounds.
    pub fn qber_increase(&self) -> Option<f64> {
        Some(self.attacked.qber.percent()? - self.baseline.qber.percent()?)
    }

    /// Secret sharing rate drop in percentage points.
    pub fn secret_sharing_degradation(&self) -> Option<f64> {
        let before = self.baseline.secret_sharing_rate.percent()?;
        Some(before - self.attacked.secret_sharing_rate.percent()?)
    }
}

impl fmt::Display for EavesdroppingComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<25} {:>10} {:>15}", "Scenario", "QBER", "Secret Sharing")?;
        for (name, stats) in [("Without Eve", &self.baseline), ("With Eve", &self.attacked)] {
            writeln!(
                f,
                "{:<25} {:>10} {:>15}",
                name,
                stats.qber.to_string(),
                stats.secret_sharing_rate.to_string()
            )?;
        }
        writeln!(f, "Predicted QBER with Eve: {:.2}%", self.predicted_qber * 100.0)?;
        match self.qber_increase() {
            Some(delta) => writeln!(f, "QBER increase due to Eve: {delta:.2}%")?,
            None => writeln!(f, "QBER increase due to Eve: n/a")?,
        }
        match self.secret_sharing_degradation() {
            Some(delta) => write!(f, "Secret sharing degradation: {delta:.2}%"),
            None => write!(f, "Secret sharing degradation: n/a"),
        }
    }
}

/// One point of a parameter sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint<P> {
    /// Swept parameter value.
    pub parameter: P,
    /// Session result at that value.
    pub statistics: SessionStatistics,
}

/// Run `config` with and without an intercept-resend attack on `targets`.
pub fn compare_eavesdropping(
    config: &SessionConfig,
    targets: Vec<PartyId>,
    strategy: EveStrategy,
) -> Result<EavesdroppingComparison, SessionError> {
    let clean = NoiseConfig { eavesdropper: None, ..config.noise.clone() };
    let baseline_config = SessionConfig { noise: clean, ..config.clone() };
    let attacked_config = SessionConfig {
        noise: baseline_config.noise.clone().with_eavesdropper(targets.clone(), strategy),
        ..config.clone()
    };

    tracing::info!(targets = ?targets, "running baseline");
    let baseline = Session::new(baseline_config).run()?;
    tracing::info!(targets = ?targets, "running with eavesdropper");
    let predicted_qber = attacked_config.predicted_qber();
    let attacked = Session::new(attacked_config).run()?;

    Ok(EavesdroppingComparison { targets, baseline, attacked, predicted_qber })
}

/// Run `config` once per channel noise level.
pub fn sweep_noise(
    config: &SessionConfig,
    levels: &[f64],
) -> Result<Vec<SweepPoint<f64>>, SessionError> {
    levels
        .iter()
        .map(|&level| {
            let noise = NoiseConfig { channel_noise: level, ..config.noise.clone() };
            let statistics = Session::new(SessionConfig { noise, ..config.clone() }).run()?;
            tracing::info!(level, qber = %statistics.qber, "noise level done");
            Ok(SweepPoint { parameter: level, statistics })
        })
        .collect()
}

/// Run `config` once per recipient count.
///
/// The configured recipients are kept in order and padded with generated
/// names. Eavesdropper targets that no longer exist are dropped.
pub fn sweep_recipients(
    config: &SessionConfig,
    counts: &[usize],
) -> Result<Vec<SweepPoint<usize>>, SessionError> {
    counts
        .iter()
        .map(|&count| {
            let recipients = recipients_for(config, count);
            let mut noise = config.noise.clone();
            if let Some(eve) = noise.eavesdropper.as_mut() {
                eve.targets.retain(|t| recipients.contains(t));
            }

            let statistics =
                Session::new(SessionConfig { recipients, noise, ..config.clone() }).run()?;
            tracing::info!(count, qber = %statistics.qber, "recipient count done");
            Ok(SweepPoint { parameter: count, statistics })
        })
        .collect()
}

fn recipients_for(config: &SessionConfig, count: usize) -> Vec<PartyId> {
    let taken = |name: &PartyId| *name == config.dealer || config.recipients.contains(name);
    let generated = RECIPIENT_NAMES
        .iter()
        .map(|n| PartyId::new(*n))
        .chain((1..).map(|i| PartyId::new(format!("Party{i}"))))
        .filter(move |p| !taken(p));

    config.recipients.iter().cloned().chain(generated).take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(qber: f64, secret_sharing: f64) -> SessionStatistics {
        SessionStatistics {
            total_rounds: 4,
            valid_rounds: 4,
            parity_passed: 4,
            excluded_rounds: 0,
            secret_sharing_successes: 4,
            qber: ghzss_core::Rate::Value(qber),
            key_rate: ghzss_core::Rate::Value(1.0),
            secret_sharing_rate: ghzss_core::Rate::Value(secret_sharing),
            basis_tallies: std::collections::BTreeMap::new(),
        }
    }

    #[test]
    fn comparison_table() {
        let comparison = EavesdroppingComparison {
            targets: vec![PartyId::new("Bob")],
            baseline: stats(0.0, 1.0),
            attacked: stats(0.25, 0.75),
            predicted_qber: 0.25,
        };

        insta::assert_snapshot!(comparison, @r"
        Scenario                        QBER  Secret Sharing
        Without Eve                    0.00%         100.00%
        With Eve                      25.00%          75.00%
        Predicted QBER with Eve: 25.00%
        QBER increase due to Eve: 25.00%
        Secret sharing degradation: 25.00%
        ");
    }

    #[test]
    fn recipients_are_padded_without_clashes() {
        let config = SessionConfig::with_parties("Bob", [PartyId::new("Zed")]);
        let names: Vec<_> = recipients_for(&config, 4).iter().map(ToString::to_string).collect();
        assert_eq!(names, ["Zed", "Charlie", "Dave", "Erin"]);
    }

    #[test]
    fn recipients_can_shrink() {
        let config = SessionConfig::default();
        assert_eq!(recipients_for(&config, 1), vec![PartyId::new("Bob")]);
    }
}
