//! Cross-round statistics.
//!
//! The aggregator counts; it never divides until [`StatsAggregator::summary`],
//! and every ratio with a zero denominator comes out as [`Rate::NoData`]
//! rather than a misleading `0.0`.

use std::{collections::BTreeMap, fmt};

use ghzss_proto::{Basis, PartyId};
use serde::{Deserialize, Serialize};

use crate::{round::RoundResult, sifting::BasisMap};

/// A ratio that may be undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rate {
    /// The denominator was zero.
    NoData,
    /// Value in `[0, 1]`.
    Value(f64),
}

impl Rate {
    /// `numerator / denominator`, or `NoData` when the denominator is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn of(numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            Self::NoData
        } else {
            Self::Value(numerator as f64 / denominator as f64)
        }
    }

    /// `1 − self`, keeping `NoData`.
    #[must_use]
    pub fn complement(self) -> Self {
        match self {
            Self::NoData => Self::NoData,
            Self::Value(v) => Self::Value(1.0 - v),
        }
    }

    /// The value, if any.
    pub fn value(self) -> Option<f64> {
        match self {
            Self::NoData => None,
            Self::Value(v) => Some(v),
        }
    }

    /// The value in percent, if any.
    pub fn percent(self) -> Option<f64> {
        self.value().map(|v| v * 100.0)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percent() {
            Some(p) => write!(f, "{p:.2}%"),
            None => write!(f, "n/a"),
        }
    }
}

/// How often one party picked each basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisTally {
    /// Rounds measured in X.
    pub x: u64,
    /// Rounds measured in Y.
    pub y: u64,
}

impl BasisTally {
    /// Count one choice.
    pub fn record(&mut self, basis: Basis) {
        match basis {
            Basis::X => self.x += 1,
            Basis::Y => self.y += 1,
        }
    }

    /// Total choices.
    pub fn total(&self) -> u64 {
        self.x + self.y
    }

    /// Share of Y choices.
    pub fn y_fraction(&self) -> Rate {
        Rate::of(self.y, self.total())
    }
}

/// Session-level results. Read-only once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    /// Rounds that completed and were evaluated.
    pub total_rounds: u64,
    /// Rounds with an even Y count.
    pub valid_rounds: u64,
    /// Valid rounds whose parity check passed.
    pub parity_passed: u64,
    /// Rounds dropped because of a protocol failure or timeout. Not part of
    /// `total_rounds`.
    pub excluded_rounds: u64,
    /// Valid rounds whose reconstruction matched the dealer's outcome.
    pub secret_sharing_successes: u64,
    /// Fraction of valid rounds failing the parity check.
    pub qber: Rate,
    /// Fraction of rounds that survived sifting.
    pub key_rate: Rate,
    /// Fraction of valid rounds with a correct reconstruction.
    pub secret_sharing_rate: Rate,
    /// Per-party basis choices over evaluated rounds.
    pub basis_tallies: BTreeMap<PartyId, BasisTally>,
}

impl SessionStatistics {
    /// Valid rounds whose parity check failed.
    pub fn parity_failed(&self) -> u64 {
        self.valid_rounds - self.parity_passed
    }
}

impl fmt::Display for SessionStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total rounds: {}", self.total_rounds)?;
        writeln!(f, "Valid rounds: {} ({})", self.valid_rounds, self.key_rate)?;
        if self.excluded_rounds > 0 {
            writeln!(f, "Excluded rounds: {}", self.excluded_rounds)?;
        }
        writeln!(f)?;
        writeln!(f, "--- Security Check (Parity) ---")?;
        writeln!(f, "Passed parity check: {}/{}", self.parity_passed, self.valid_rounds)?;
        writeln!(f, "Failed parity check: {}/{}", self.parity_failed(), self.valid_rounds)?;
        writeln!(f, "QBER: {}", self.qber)?;
        writeln!(f)?;
        writeln!(f, "--- Secret Sharing ---")?;
        write!(
            f,
            "Successful reconstructions: {}/{} ({})",
            self.secret_sharing_successes, self.valid_rounds, self.secret_sharing_rate
        )?;
        if !self.basis_tallies.is_empty() {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "--- Basis Choices ---")?;
            for (party, tally) in &self.basis_tallies {
                write!(f, "\n{party}: X={} Y={}", tally.x, tally.y)?;
            }
        }
        Ok(())
    }
}

/// Running counters for one session.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    total: u64,
    valid: u64,
    parity_passed: u64,
    excluded: u64,
    successes: u64,
    tallies: BTreeMap<PartyId, BasisTally>,
}

impl StatsAggregator {
    /// Empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an evaluated round.
    pub fn record(&mut self, result: &RoundResult) {
        self.total += 1;
        if !result.valid {
            return;
        }
        self.valid += 1;
        if result.parity_ok == Some(true) {
            self.parity_passed += 1;
        }
        if result.reconstruction_matches == Some(true) {
            self.successes += 1;
        }
    }

    /// Count a round that was dropped before evaluation.
    pub fn record_excluded(&mut self) {
        self.excluded += 1;
    }

    /// Count the basis choices of an evaluated round.
    pub fn record_bases(&mut self, bases: &BasisMap) {
        for (party, basis) in bases {
            self.tallies.entry(party.clone()).or_default().record(*basis);
        }
    }

    /// Rounds counted so far, excluded ones included.
    pub fn rounds_seen(&self) -> u64 {
        self.total + self.excluded
    }

    /// Snapshot of the current counters.
    pub fn summary(&self) -> SessionStatistics {
        SessionStatistics {
            total_rounds: self.total,
            valid_rounds: self.valid,
            parity_passed: self.parity_passed,
            excluded_rounds: self.excluded,
            secret_sharing_successes: self.successes,
            qber: Rate::of(self.parity_passed, self.valid).complement(),
            key_rate: Rate::of(self.valid, self.total),
            secret_sharing_rate: Rate::of(self.successes, self.valid),
            basis_tallies: self.tallies.clone(),
        }
    }
}
