//! Round records and their evaluation.

use std::collections::BTreeMap;

use ghzss_proto::{Basis, Outcome, PartyId};
use serde::{Deserialize, Serialize};

use crate::{
    error::{EvaluationError, ProtocolError},
    sifting::{self, BasisMap, OutcomeMap},
};

/// What one party knows when it reaches `Terminal`.
///
/// The public view (`bases`) is identical at every party of a completed
/// round. `outcome` is private until post-hoc verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyReport {
    /// Reporting party.
    pub party: PartyId,
    /// Round number.
    pub round: u64,
    /// Basis this party measured in.
    pub basis: Basis,
    /// Outcome this party reported (after any noise).
    pub outcome: Outcome,
    /// Every party's public basis, as seen by this party.
    pub bases: BasisMap,
}

impl PartyReport {
    /// The party's local sifting decision.
    pub fn is_valid(&self) -> bool {
        sifting::is_valid(&self.bases)
    }
}

/// Basis and outcome of every party for exactly one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    round: u64,
    entries: BTreeMap<PartyId, (Basis, Outcome)>,
}

impl RoundRecord {
    /// Build a record. At least two parties are required.
    pub fn new(
        round: u64,
        entries: BTreeMap<PartyId, (Basis, Outcome)>,
    ) -> Result<Self, EvaluationError> {
        if entries.len() < 2 {
            return Err(EvaluationError::TooFewParties(entries.len()));
        }
        Ok(Self { round, entries })
    }

    /// Assemble a record from the reports of `parties`.
    ///
    /// Every party must report exactly once, nobody else may report, and all
    /// reports must carry the same public basis set that agrees with each
    /// reporter's own basis.
    pub fn from_reports(
        round: u64,
        parties: &[PartyId],
        reports: impl IntoIterator<Item = PartyReport>,
    ) -> Result<Self, ProtocolError> {
        let mut by_party: BTreeMap<PartyId, PartyReport> = BTreeMap::new();

        for report in reports {
            if report.round != round {
                return Err(ProtocolError::RoundMismatch { expected: round, actual: report.round });
            }
            if !parties.contains(&report.party) {
                return Err(ProtocolError::UnknownParty(report.party));
            }
            if by_party.contains_key(&report.party) {
                return Err(ProtocolError::InconsistentViews(round));
            }
            by_party.insert(report.party.clone(), report);
        }

        if let Some(missing) = parties.iter().find(|p| !by_party.contains_key(*p)) {
            return Err(ProtocolError::MissingParty(missing.clone()));
        }

        let mut views = by_party.values().map(|r| &r.bases);
        if let Some(first) = views.next() {
            if views.any(|v| v != first) || first.len() != parties.len() {
                return Err(ProtocolError::InconsistentViews(round));
            }
        }

        let mut entries = BTreeMap::new();
        for (party, report) in by_party {
            if report.bases.get(&party) != Some(&report.basis) {
                return Err(ProtocolError::ConflictingBasis(party));
            }
            entries.insert(party, (report.basis, report.outcome));
        }

        Ok(Self::new(round, entries)?)
    }

    /// Round number.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Number of parties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; records hold at least two parties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for one party.
    pub fn get(&self, party: &PartyId) -> Option<(Basis, Outcome)> {
        self.entries.get(party).copied()
    }

    /// Iterate entries in party order.
    pub fn iter(&self) -> impl Iterator<Item = (&PartyId, Basis, Outcome)> {
        self.entries.iter().map(|(p, (b, o))| (p, *b, *o))
    }

    /// Public bases.
    pub fn bases(&self) -> BasisMap {
        self.entries.iter().map(|(p, (b, _))| (p.clone(), *b)).collect()
    }

    /// Revealed outcomes.
    pub fn outcomes(&self) -> OutcomeMap {
        self.entries.iter().map(|(p, (_, o))| (p.clone(), *o)).collect()
    }
}

/// Verdict on one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    /// Round number.
    pub round: u64,
    /// Even number of Y bases.
    pub valid: bool,
    /// Number of Y bases, dealer included.
    pub y_count: usize,
    /// GHZ correlation held. `None` for invalid rounds.
    pub parity_ok: Option<bool>,
    /// Dealer bit recovered from the recipients. `None` for invalid rounds.
    pub reconstructed_secret: Option<Outcome>,
    /// Reconstruction equals the dealer's outcome. `None` for invalid rounds.
    pub reconstruction_matches: Option<bool>,
    /// The dealer's own outcome.
    pub dealer_outcome: Outcome,
}

impl RoundResult {
    /// Valid round whose parity check failed.
    pub fn is_error(&self) -> bool {
        self.parity_ok == Some(false)
    }
}

/// Sift and verify a record.
///
/// Invalid rounds are a normal result, not an error: the optional fields are
/// left empty and neither the parity check nor the reconstruction runs.
pub fn evaluate(record: &RoundRecord, dealer: &PartyId) -> Result<RoundResult, EvaluationError> {
    let (_, dealer_outcome) =
        record.get(dealer).ok_or_else(|| EvaluationError::UnknownDealer(dealer.clone()))?;

    let bases = record.bases();
    let y_count = sifting::y_count(bases.values());

    if !sifting::is_valid(&bases) {
        return Ok(RoundResult {
            round: record.round(),
            valid: false,
            y_count,
            parity_ok: None,
            reconstructed_secret: None,
            reconstruction_matches: None,
            dealer_outcome,
        });
    }

    let outcomes = record.outcomes();
    let parity_ok = sifting::check_parity(&bases, &outcomes)?;
    let secret = sifting::reconstruct(&bases, &outcomes, dealer)?;

    Ok(RoundResult {
        round: record.round(),
        valid: true,
        y_count,
        parity_ok: Some(parity_ok),
        reconstructed_secret: Some(secret),
        reconstruction_matches: Some(secret == dealer_outcome),
        dealer_outcome,
    })
}

#[cfg(test)]
mod tests {
    use Basis::{X, Y};
    use Outcome::{One, Zero};

    use super::*;

    fn record(list: &[(&str, Basis, Outcome)]) -> RoundRecord {
        let entries = list.iter().map(|(p, b, o)| (PartyId::new(*p), (*b, *o))).collect();
        RoundRecord::new(0, entries).unwrap()
    }

    fn report(party: &str, basis: Basis, outcome: Outcome, view: &[(&str, Basis)]) -> PartyReport {
        PartyReport {
            party: PartyId::new(party),
            round: 3,
            basis,
            outcome,
            bases: view.iter().map(|(p, b)| (PartyId::new(*p), *b)).collect(),
        }
    }

    #[test]
    fn single_party_record_is_rejected() {
        let entries = BTreeMap::from([(PartyId::new("Alice"), (X, Zero))]);
        assert_eq!(RoundRecord::new(0, entries), Err(EvaluationError::TooFewParties(1)));
    }

    #[test]
    fn invalid_round_leaves_verdict_empty() {
        let rec = record(&[("Alice", Y), ("Bob", X), ("Charlie", X)].map(|(p, b)| (p, b, Zero)));
        let result = evaluate(&rec, &PartyId::new("Alice")).unwrap();

        assert!(!result.valid);
        assert_eq!(result.parity_ok, None);
        assert_eq!(result.reconstructed_secret, None);
        assert_eq!(result.reconstruction_matches, None);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let rec = record(&[("Alice", X, One), ("Bob", Y, Zero), ("Charlie", Y, Zero)]);
        let dealer = PartyId::new("Alice");
        assert_eq!(evaluate(&rec, &dealer), evaluate(&rec, &dealer));
    }

    #[test]
    fn from_reports_accepts_consistent_views() {
        let view = [("Alice", X), ("Bob", Y), ("Charlie", Y)];
        let parties: Vec<_> = ["Alice", "Bob", "Charlie"].map(PartyId::new).to_vec();
        let reports = vec![
            report("Charlie", Y, Zero, &view),
            report("Alice", X, One, &view),
            report("Bob", Y, Zero, &view),
        ];

        let rec = RoundRecord::from_reports(3, &parties, reports).unwrap();
        assert_eq!(rec.len(), 3);
        assert_eq!(rec.get(&PartyId::new("Alice")), Some((X, One)));
    }

    #[test]
    fn from_reports_rejects_missing_party() {
        let view = [("Alice", X), ("Bob", X)];
        let parties: Vec<_> = ["Alice", "Bob"].map(PartyId::new).to_vec();
        let reports = vec![report("Alice", X, One, &view)];

        assert_eq!(
            RoundRecord::from_reports(3, &parties, reports),
            Err(ProtocolError::MissingParty(PartyId::new("Bob")))
        );
    }

    #[test]
    fn from_reports_rejects_diverging_views() {
        let parties: Vec<_> = ["Alice", "Bob"].map(PartyId::new).to_vec();
        let reports = vec![
            report("Alice", X, One, &[("Alice", X), ("Bob", X)]),
            report("Bob", X, One, &[("Alice", Y), ("Bob", X)]),
        ];

        assert_eq!(
            RoundRecord::from_reports(3, &parties, reports),
            Err(ProtocolError::InconsistentViews(3))
        );
    }

    #[test]
    fn from_reports_rejects_self_contradiction() {
        let view = [("Alice", X), ("Bob", X)];
        let parties: Vec<_> = ["Alice", "Bob"].map(PartyId::new).to_vec();
        let reports = vec![report("Alice", X, One, &view), report("Bob", Y, One, &view)];

        assert_eq!(
            RoundRecord::from_reports(3, &parties, reports),
            Err(ProtocolError::ConflictingBasis(PartyId::new("Bob")))
        );
    }
}
