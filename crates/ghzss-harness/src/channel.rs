//! In-memory classical channel.
//!
//! One tokio mpsc inbox per party. A fresh set is built for every round, so
//! nothing can leak from one round into the next. Latency is applied by the
//! sender before handing the message to the channel; a sender's messages
//! therefore arrive in the order it sent them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use ghzss_core::{Environment, Roster, Transport, TransportError};
use ghzss_proto::{BasisAnnouncement, PartyId};
use tokio::sync::mpsc;

use crate::config::LatencyRange;

type Envelope = (PartyId, BasisAnnouncement);

/// One party's end of the in-memory network.
pub struct ChannelTransport<E: Environment> {
    me: PartyId,
    env: E,
    latency: LatencyRange,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    outboxes: BTreeMap<PartyId, mpsc::UnboundedSender<Envelope>>,
    sent: u64,
}

impl<E: Environment> ChannelTransport<E> {
    /// Connect every party of `roster` to every other.
    ///
    /// `env_for` supplies the environment each sender draws its latency from.
    /// Transports come back in roster order.
    pub fn network(
        roster: &Roster,
        latency: LatencyRange,
        mut env_for: impl FnMut(&PartyId) -> E,
    ) -> Vec<Self> {
        let mut inboxes = Vec::with_capacity(roster.len());
        let mut senders = BTreeMap::new();
        for party in roster.parties() {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(party.clone(), tx);
            inboxes.push((party.clone(), rx));
        }

        inboxes
            .into_iter()
            .map(|(me, inbox)| {
                let outboxes = senders
                    .iter()
                    .filter(|(p, _)| **p != me)
                    .map(|(p, tx)| (p.clone(), tx.clone()))
                    .collect();
                Self {
                    env: env_for(&me),
                    latency,
                    inbox,
                    outboxes,
                    sent: 0,
                    me,
                }
            })
            .collect()
    }

    /// Owning party.
    pub fn party(&self) -> &PartyId {
        &self.me
    }

    /// Announcements sent through this end.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

#[async_trait]
impl<E: Environment> Transport for ChannelTransport<E> {
    async fn send(
        &mut self,
        to: &PartyId,
        announcement: BasisAnnouncement,
    ) -> Result<(), TransportError> {
        let outbox = self.outboxes.get(to).ok_or_else(|| TransportError::UnknownPeer(to.clone()))?;

        let delay = self.latency.sample(&self.env);
        if !delay.is_zero() {
            self.env.sleep(delay).await;
        }

        outbox
            .send((self.me.clone(), announcement))
            .map_err(|_| TransportError::Closed(format!("{to} hung up")))?;
        self.sent += 1;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Envelope, TransportError> {
        self.inbox
            .recv()
            .await
            .ok_or_else(|| TransportError::Closed(format!("inbox of {} closed", self.me)))
    }
}
