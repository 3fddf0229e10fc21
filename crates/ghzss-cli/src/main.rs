//! `ghzss` binary.
//!
//! # Usage
//!
//! ```bash
//! # Noiseless three-party session
//! ghzss run --rounds 1000
//!
//! # Eavesdropper on Bob's link, compared against a clean run
//! ghzss compare --eve Bob --seed 7
//!
//! # QBER as a function of channel noise
//! ghzss sweep-noise --levels 0,0.05,0.1
//! ```

use clap::Parser;
use ghzss_cli::{Cli, SystemEnv, execute};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Reports go to stdout, logs to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    execute(&args.command, &SystemEnv::new(), &mut std::io::stdout().lock())?;

    Ok(())
}
