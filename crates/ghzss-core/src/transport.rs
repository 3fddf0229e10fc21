//! Seam to the classical channel.
//!
//! Delivery is reliable and in order per directed pair of parties, with
//! arbitrary latency. Nothing else is assumed: announcements from different
//! senders may interleave freely, and a fast peer may already be sending for
//! the next round.

use async_trait::async_trait;
use ghzss_proto::{BasisAnnouncement, PartyId};

use crate::error::TransportError;

/// Point-to-point announcement channel of one party.
#[async_trait]
pub trait Transport: Send {
    /// Send an announcement to a peer.
    async fn send(
        &mut self,
        to: &PartyId,
        announcement: BasisAnnouncement,
    ) -> Result<(), TransportError>;

    /// Next announcement addressed to this party, with its sender.
    async fn recv(&mut self) -> Result<(PartyId, BasisAnnouncement), TransportError>;
}
