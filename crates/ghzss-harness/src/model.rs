//! Reference model of GHZ sifting.
//!
//! The model works in ±1 eigenvalues instead of bits. For the GHZ state
//! the expectation of a product of X and Y observables is the real part of
//! `i^y`: ±1 when `y` is even, 0 when odd. A zero expectation means the
//! outcomes carry no joint information, so the round is discarded;
//! otherwise the product of all eigenvalues must equal the expectation.
//!
//! Nothing here shares code with `ghzss_core::sifting`, which makes it a
//! usable oracle for it.

use ghzss_proto::{Basis, Outcome};

/// Expectation of the product of the observables, `Re(i^y)`.
pub fn correlation(bases: &[Basis]) -> i8 {
    const RE_I_POW: [i8; 4] = [1, 0, -1, 0];
    let y = bases.iter().filter(|b| **b == Basis::Y).count();
    RE_I_POW[y % 4]
}

/// Model verdict on one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelVerdict {
    /// The outcomes are jointly correlated.
    pub valid: bool,
    /// Eigenvalue product matches the correlation.
    pub parity_ok: Option<bool>,
    /// Dealer outcome implied by the recipients.
    pub reconstructed: Option<Outcome>,
}

/// One round as the model sees it. The dealer is the first entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRound {
    entries: Vec<(Basis, Outcome)>,
}

impl ModelRound {
    /// Round from `(basis, outcome)` pairs, dealer first.
    pub fn new(entries: Vec<(Basis, Outcome)>) -> Self {
        Self { entries }
    }

    /// Judge the round.
    pub fn verdict(&self) -> ModelVerdict {
        let bases: Vec<Basis> = self.entries.iter().map(|(b, _)| *b).collect();
        let expected = correlation(&bases);
        if expected == 0 {
            return ModelVerdict { valid: false, parity_ok: None, reconstructed: None };
        }

        let product: i8 = self.entries.iter().map(|(_, o)| o.eigenvalue()).product();
        let recipients: i8 = self.entries.iter().skip(1).map(|(_, o)| o.eigenvalue()).product();

        // The dealer's eigenvalue is whatever completes the product.
        let dealer = expected * recipients;

        ModelVerdict {
            valid: true,
            parity_ok: Some(product == expected),
            reconstructed: Some(Outcome::from_bool(dealer == -1)),
        }
    }
}
