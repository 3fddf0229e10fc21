//! Argument parsing and command execution.

use clap::Parser;
use ghzss_cli::{Cli, CliError, Command, SystemEnv, TopologyKind, execute};
use ghzss_core::{ConfigError, EveStrategy, Topology};
use ghzss_proto::{Basis, PartyId};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("ghzss").chain(args.iter().copied())).unwrap()
}

fn session(cli: &Cli) -> &ghzss_cli::SessionArgs {
    match &cli.command {
        Command::Run { session, .. }
        | Command::Compare { session }
        | Command::SweepNoise { session, .. }
        | Command::SweepRecipients { session, .. } => session,
    }
}

fn run(args: &[&str]) -> Result<String, CliError> {
    let cli = parse(args);
    let mut out = Vec::new();
    execute(&cli.command, &SystemEnv::new(), &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

#[test]
fn defaults() {
    let cli = parse(&["run"]);
    let args = session(&cli);

    assert_eq!(args.dealer, "Alice");
    assert_eq!(args.recipients, ["Bob", "Charlie"]);
    assert_eq!(args.rounds, 1000);
    assert_eq!(args.topology, TopologyKind::Mesh);
    assert_eq!(cli.log_level, "info");
}

#[test]
fn arguments_become_a_config() {
    let cli = parse(&[
        "run",
        "--recipients",
        "Bob,Charlie,Dave",
        "--noise",
        "0.05",
        "--eve",
        "Dave",
        "--eve-basis",
        "y",
        "--topology",
        "coordinator",
        "--seed",
        "9",
    ]);
    let config = session(&cli).to_config(&SystemEnv::new()).unwrap();

    assert_eq!(config.seed, 9);
    assert_eq!(config.recipients.len(), 3);
    assert_eq!(config.topology, Topology::Coordinator { hub: PartyId::new("Bob") });
    assert!((config.noise.channel_noise - 0.05).abs() < 1e-12);

    let eve = config.noise.eavesdropper.unwrap();
    assert_eq!(eve.targets, [PartyId::new("Dave")]);
    assert_eq!(eve.strategy, EveStrategy::Fixed(Basis::Y));
}

#[test]
fn explicit_hub_wins() {
    let cli = parse(&["run", "--topology", "coordinator", "--hub", "Alice", "--seed", "1"]);
    let config = session(&cli).to_config(&SystemEnv::new()).unwrap();
    assert_eq!(config.topology, Topology::Coordinator { hub: PartyId::new("Alice") });
}

#[test]
fn bad_arguments_are_config_errors() {
    let cli = parse(&["run", "--noise", "1.5", "--seed", "1"]);
    assert!(matches!(
        session(&cli).to_config(&SystemEnv::new()),
        Err(CliError::Config(ConfigError::NoiseOutOfRange(_)))
    ));

    let cli = parse(&["run", "--eve", "Mallory", "--seed", "1"]);
    assert!(matches!(
        session(&cli).to_config(&SystemEnv::new()),
        Err(CliError::Config(ConfigError::InvalidTarget(_)))
    ));

    let inverted = ["run", "--network", "--latency-min-ms", "10", "--latency-max-ms", "5"];
    assert!(matches!(run(&inverted), Err(CliError::Config(ConfigError::InvalidLatency { .. }))));
}

#[test]
fn run_prints_report() {
    let report = run(&["run", "--rounds", "50", "--seed", "3"]).unwrap();

    assert!(report.contains("Total rounds: 50"), "{report}");
    assert!(report.contains("--- Security Check (Parity) ---"));
}

#[test]
fn compare_requires_targets() {
    assert!(matches!(run(&["compare", "--seed", "1"]), Err(CliError::NoTargets)));
}

#[test]
fn compare_prints_table() {
    let report = run(&["compare", "--eve", "Bob", "--rounds", "100", "--seed", "4"]).unwrap();
    assert!(report.contains("Without Eve"));
    assert!(report.contains("With Eve"));
}

#[test]
fn sweep_prints_one_row_per_point() {
    let report =
        run(&["sweep-recipients", "--counts", "1,2,3", "--rounds", "20", "--seed", "5"]).unwrap();
    assert_eq!(report.lines().count(), 4, "{report}");
}
