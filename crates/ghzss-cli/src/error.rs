//! CLI errors.

use ghzss_core::ConfigError;
use ghzss_harness::SessionError;
use thiserror::Error;

/// Anything that stops the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// The arguments describe an impossible session.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The session itself failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// `compare` was run without `--eve`.
    #[error("compare needs at least one --eve target")]
    NoTargets,

    /// The report could not be written.
    #[error("cannot write report: {0}")]
    Io(#[from] std::io::Error),
}
