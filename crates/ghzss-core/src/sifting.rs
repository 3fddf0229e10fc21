//! Sifting and verification over public bases and revealed outcomes.
//!
//! For the N-qubit GHZ state |0…0⟩ + |1…1⟩ measured in X/Y bases, the
//! product of all N eigenvalues is deterministic exactly when an even number
//! of parties chose Y, and then equals (−1)^(y/2). In bit form: the XOR of all
//! outcome bits equals `(y / 2) mod 2`.
//!
//! Everything here is a pure function. Calling the parity check or the
//! reconstruction on an invalid round is an error, never a silent `false`.

use std::collections::BTreeMap;

use ghzss_proto::{Basis, Outcome, PartyId};

use crate::error::EvaluationError;

/// Public bases of one round, keyed by party.
pub type BasisMap = BTreeMap<PartyId, Basis>;

/// Revealed outcomes of one round, keyed by party.
pub type OutcomeMap = BTreeMap<PartyId, Outcome>;

/// Number of Y bases.
pub fn y_count<'a>(bases: impl IntoIterator<Item = &'a Basis>) -> usize {
    bases.into_iter().filter(|b| b.is_y()).count()
}

/// A round is usable iff an even number of parties measured in Y.
pub fn is_valid(bases: &BasisMap) -> bool {
    y_count(bases.values()) % 2 == 0
}

/// XOR of all outcomes that a valid round with `y_count` Y bases must show.
pub fn expected_parity(y_count: usize) -> Outcome {
    Outcome::from_bool((y_count / 2) % 2 == 1)
}

/// XOR of a sequence of outcomes.
pub fn xor_all<'a>(outcomes: impl IntoIterator<Item = &'a Outcome>) -> Outcome {
    outcomes.into_iter().fold(Outcome::Zero, |acc, o| acc ^ *o)
}

fn guard_valid(bases: &BasisMap) -> Result<usize, EvaluationError> {
    let y = y_count(bases.values());
    if y % 2 == 0 { Ok(y) } else { Err(EvaluationError::InvalidRound { y_count: y }) }
}

fn outcome_of(outcomes: &OutcomeMap, party: &PartyId) -> Result<Outcome, EvaluationError> {
    outcomes.get(party).copied().ok_or_else(|| EvaluationError::MissingParty(party.clone()))
}

/// Verify the GHZ correlation of a valid round.
///
/// Every party in `bases` must have an outcome and vice versa.
pub fn check_parity(bases: &BasisMap, outcomes: &OutcomeMap) -> Result<bool, EvaluationError> {
    let y = guard_valid(bases)?;

    if let Some(extra) = outcomes.keys().find(|p| !bases.contains_key(*p)) {
        return Err(EvaluationError::MissingParty(extra.clone()));
    }

    let mut parity = Outcome::Zero;
    for party in bases.keys() {
        parity = parity ^ outcome_of(outcomes, party)?;
    }

    Ok(parity == expected_parity(y))
}

/// Recover the dealer's outcome from the recipients' outcomes.
///
/// Only the outcomes of non-dealer parties are read; the Y count includes
/// the dealer's public basis. The result equals the dealer's real outcome
/// exactly when [`check_parity`] holds for the full record.
pub fn reconstruct(
    bases: &BasisMap,
    outcomes: &OutcomeMap,
    dealer: &PartyId,
) -> Result<Outcome, EvaluationError> {
    let y = guard_valid(bases)?;

    if !bases.contains_key(dealer) {
        return Err(EvaluationError::UnknownDealer(dealer.clone()));
    }

    let mut secret = expected_parity(y);
    for party in bases.keys().filter(|p| *p != dealer) {
        secret = secret ^ outcome_of(outcomes, party)?;
    }

    Ok(secret)
}
