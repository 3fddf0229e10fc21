//! Fuzz target for the per-party round state machine
//!
//! # Strategy
//!
//! - Arbitrary event sequences for one party of a four-party round
//! - Announcements from members, strangers and the party itself, for the
//!   current and other rounds, with arbitrary basis maps
//!
//! # Invariants
//!
//! - NEVER panic, whatever arrives in whatever state
//! - Sends never target the party itself and carry the machine's round
//! - `Decided` is emitted at most once, only on entering `Terminal`
//! - A decision carries a basis for every party and agrees with the
//!   party's own basis and outcome

#![no_main]

use std::{
    collections::BTreeMap,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use arbitrary::Arbitrary;
use ghzss_core::{
    BasisPolicy, Environment, Party, PartyAction, PartyEvent, RoundMachine, RoundState, Roster,
    Topology,
};
use ghzss_proto::{Basis, BasisAnnouncement, Outcome, PartyId};
use libfuzzer_sys::fuzz_target;

const NAMES: [&str; 5] = ["A", "B", "C", "D", "Mallory"];

/// Counter-based environment. Deterministic per input.
#[derive(Clone)]
struct FuzzEnv(Arc<AtomicU64>);

impl Environment for FuzzEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        for byte in buffer {
            *byte = (self.0.fetch_add(0x9E37, Ordering::Relaxed) >> 3) as u8;
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzEvent {
    ShareReady,
    Measured(bool),
    Announcement { from: u8, round_offset: i8, entries: Vec<(u8, bool)> },
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    me: u8,
    topology: u8,
    seed: u64,
    events: Vec<FuzzEvent>,
}

fn name(index: u8) -> PartyId {
    PartyId::new(NAMES[usize::from(index) % NAMES.len()])
}

fuzz_target!(|input: FuzzInput| {
    let roster = Arc::new(
        Roster::new("A", [name(1), name(2), name(3)]).unwrap_or_else(|_| unreachable!()),
    );
    let topology = match input.topology % 3 {
        0 => Topology::FullMesh,
        1 => Topology::Coordinator { hub: name(input.topology % 4) },
        _ => Topology::Chain,
    };
    let me = name(input.me % 4);
    let Some(party) = Party::new(&me, &roster, &topology) else {
        return;
    };

    let round = 7;
    let env = FuzzEnv(Arc::new(AtomicU64::new(input.seed)));
    let mut machine =
        RoundMachine::new(env, party, Arc::clone(&roster), topology, BasisPolicy::Uniform, round);
    let mut chosen: Option<Basis> = None;
    let mut measured: Option<Outcome> = None;
    let mut decided = false;

    for event in input.events {
        let event = match event {
            FuzzEvent::ShareReady => PartyEvent::ShareReady,
            FuzzEvent::Measured(bit) => PartyEvent::Measured(Outcome::from_bool(bit)),
            FuzzEvent::Announcement { from, round_offset, entries } => {
                let bases: BTreeMap<PartyId, Basis> = entries
                    .into_iter()
                    .map(|(p, y)| (name(p), if y { Basis::Y } else { Basis::X }))
                    .collect();
                let announced = round.saturating_add_signed(i64::from(round_offset));
                PartyEvent::AnnouncementReceived {
                    from: name(from),
                    announcement: BasisAnnouncement::relay(announced, bases),
                }
            },
        };
        if let PartyEvent::Measured(outcome) = &event {
            if machine.state() == RoundState::Measure {
                measured = Some(*outcome);
            }
        }

        match machine.handle(event) {
            Ok(actions) => {
                for action in actions {
                    match action {
                        PartyAction::Measure { basis } => chosen = Some(basis),
                        PartyAction::Send { to, announcement } => {
                            assert_ne!(to, me, "sent to self");
                            assert_eq!(announcement.round, round);
                        },
                        PartyAction::Decided(report) => {
                            assert!(!decided, "decided twice");
                            decided = true;
                            assert_eq!(machine.state(), RoundState::Terminal);
                            assert_eq!(report.bases.len(), roster.len());
                            assert_eq!(Some(report.basis), chosen);
                            assert_eq!(Some(report.outcome), measured);
                            assert_eq!(report.bases.get(&me), chosen.as_ref());
                        },
                    }
                }
            },
            // Poisoned: the driver drops the round here.
            Err(_) => break,
        }
    }
});
