//! Seam to the quantum layer.
//!
//! State preparation, distribution and measurement live outside this crate.
//! A round's machine only needs two things from them: to learn that its share
//! has arrived, and to measure that share once.

use std::sync::Arc;

use async_trait::async_trait;
use ghzss_proto::{Basis, Outcome, PartyId};

use crate::error::QuantumError;

/// Claim on one party's share of one round's entangled state.
///
/// Consumed by [`QuantumLayer::measure`], so a share cannot be measured twice
/// through the same handle.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ShareHandle {
    party: PartyId,
    round: u64,
}

impl ShareHandle {
    /// Handle for `party`'s share in `round`.
    pub fn new(party: PartyId, round: u64) -> Self {
        Self { party, round }
    }

    /// Owning party.
    pub fn party(&self) -> &PartyId {
        &self.party
    }

    /// Round of the share.
    pub fn round(&self) -> u64 {
        self.round
    }
}

/// Entangled-state provider.
#[async_trait]
pub trait QuantumLayer: Send + Sync {
    /// Wait until `party`'s share for `round` has been delivered.
    async fn await_share_ready(&self, party: &PartyId, round: u64)
    -> Result<ShareHandle, QuantumError>;

    /// Measure a share in `basis`. The raw outcome carries no channel noise
    /// model; the caller applies its own.
    async fn measure(&self, handle: ShareHandle, basis: Basis) -> Result<Outcome, QuantumError>;
}

#[async_trait]
impl<Q: QuantumLayer + ?Sized> QuantumLayer for Arc<Q> {
    async fn await_share_ready(
        &self,
        party: &PartyId,
        round: u64,
    ) -> Result<ShareHandle, QuantumError> {
        (**self).await_share_ready(party, round).await
    }

    async fn measure(&self, handle: ShareHandle, basis: Basis) -> Result<Outcome, QuantumError> {
        (**self).measure(handle, basis).await
    }
}
