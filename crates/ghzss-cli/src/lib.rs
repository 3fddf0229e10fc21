//! Command-line front end for GHZ secret sharing simulations.
//!
//! The binary parses [`Cli`], configures logging and hands the command to
//! [`execute`], which writes human-readable reports to the given writer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod args;
mod error;
mod system_env;

use std::io::Write;

use ghzss_core::{Environment, SessionStatistics};
use ghzss_harness::{
    Session, SweepPoint, compare_eavesdropping, run_networked_session, sweep_noise,
    sweep_recipients,
};
use ghzss_proto::PartyId;

pub use args::{Cli, Command, EveBasis, SessionArgs, TopologyKind};
pub use error::CliError;
pub use system_env::SystemEnv;

/// Run `command`, writing its report to `out`.
pub fn execute(
    command: &Command,
    env: &impl Environment,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Run { session, network } => {
            let config = session.to_config(env)?;
            tracing::info!(seed = config.seed, "replay with --seed {}", config.seed);
            let stats = if *network {
                run_networked_session(&config)?
            } else {
                Session::new(config).run()?
            };
            writeln!(out, "{stats}")?;
        },
        Command::Compare { session } => {
            if session.eve.is_empty() {
                return Err(CliError::NoTargets);
            }
            let config = session.to_config(env)?;
            let targets: Vec<PartyId> = session.eve.iter().map(PartyId::new).collect();
            let comparison = compare_eavesdropping(&config, targets, session.eve_basis.into())?;
            writeln!(out, "{comparison}")?;
        },
        Command::SweepNoise { session, levels } => {
            let points = sweep_noise(&session.to_config(env)?, levels)?;
            write_sweep(out, "Noise", &points, |level| format!("{level:.3}"))?;
        },
        Command::SweepRecipients { session, counts } => {
            let points = sweep_recipients(&session.to_config(env)?, counts)?;
            write_sweep(out, "Recipients", &points, ToString::to_string)?;
        },
    }
    Ok(())
}

fn write_sweep<P>(
    out: &mut impl Write,
    label: &str,
    points: &[SweepPoint<P>],
    show: impl Fn(&P) -> String,
) -> Result<(), CliError> {
    writeln!(out, "{label:<12} {:>10} {:>10} {:>15}", "QBER", "Key rate", "Secret Sharing")?;
    for SweepPoint { parameter, statistics } in points {
        let SessionStatistics { qber, key_rate, secret_sharing_rate, .. } = statistics;
        writeln!(
            out,
            "{:<12} {:>10} {:>10} {:>15}",
            show(parameter),
            qber.to_string(),
            key_rate.to_string(),
            secret_sharing_rate.to_string()
        )?;
    }
    Ok(())
}
