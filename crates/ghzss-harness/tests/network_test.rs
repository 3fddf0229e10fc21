//! Sessions over turmoil's simulated TCP network.

use std::time::Duration;

use ghzss_core::{EveStrategy, NoiseConfig, Rate, Topology};
use ghzss_harness::{LatencyRange, SessionConfig, run_networked_session};
use ghzss_proto::PartyId;

fn networked(rounds: u64, seed: u64) -> SessionConfig {
    SessionConfig {
        rounds,
        seed,
        latency: LatencyRange::new(Duration::from_millis(5), Duration::from_millis(20)),
        round_timeout: Duration::from_secs(2),
        ..SessionConfig::default()
    }
}

#[test]
fn noiseless_networked_session() {
    let stats = run_networked_session(&networked(40, 1)).unwrap();

    assert_eq!(stats.total_rounds, 40);
    assert_eq!(stats.excluded_rounds, 0);
    assert_eq!(stats.qber, Rate::Value(0.0));
    assert_eq!(stats.secret_sharing_rate, Rate::Value(1.0));
}

#[test]
fn networked_session_replays_from_seed() {
    let config = SessionConfig { noise: NoiseConfig::with_channel_noise(0.2), ..networked(30, 5) };

    let first = run_networked_session(&config).unwrap();
    let second = run_networked_session(&config).unwrap();

    assert_eq!(first, second);
}

#[test]
fn chain_over_tcp() {
    let config = SessionConfig {
        topology: Topology::Chain,
        ..SessionConfig {
            recipients: ["Bob", "Charlie", "Dave"].map(PartyId::new).to_vec(),
            ..networked(25, 2)
        }
    };
    let stats = run_networked_session(&config).unwrap();

    assert_eq!(stats.total_rounds, 25);
    assert_eq!(stats.qber, Rate::Value(0.0));
}

#[test]
fn coordinator_over_tcp_detects_eavesdropper() {
    let config = SessionConfig {
        topology: Topology::Coordinator { hub: PartyId::new("Alice") },
        noise: NoiseConfig::noiseless()
            .with_eavesdropper([PartyId::new("Charlie")], EveStrategy::Fixed(ghzss_proto::Basis::X)),
        ..networked(200, 3)
    };
    let stats = run_networked_session(&config).unwrap();

    assert_eq!(stats.total_rounds, 200);
    let qber = stats.qber.value().unwrap();
    assert!(qber > 0.1 && qber < 0.4, "qber {qber}");
}

#[test]
fn networked_rounds_that_time_out_are_excluded() {
    let config = SessionConfig {
        latency: LatencyRange::new(Duration::from_millis(50), Duration::from_millis(60)),
        round_timeout: Duration::from_millis(10),
        ..networked(8, 4)
    };
    let stats = run_networked_session(&config).unwrap();

    assert_eq!(stats.total_rounds, 0);
    assert_eq!(stats.excluded_rounds, 8);
    assert_eq!(stats.qber, Rate::NoData);
}
