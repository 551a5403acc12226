//! Command-line interface for loading MLT tiles into typed collections.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod load;

pub use error::CliError;

use load::{LoadArgs, run_load};

pub(crate) const ARG_PATHS: &str = "paths";
pub(crate) const ARG_SCHEME: &str = "scheme";
pub(crate) const ARG_SEPARATE: &str = "separate";
pub(crate) const ARG_RAW: &str = "raw";
pub(crate) const ARG_TILE: &str = "tile";
pub(crate) const ARG_MIXED: &str = "mixed";
pub(crate) const ARG_OUTPUT: &str = "output";
pub(crate) const ENV_PATHS: &str = "MLT_LOADER_CMDS_LOAD_PATHS";

/// Run the loader CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Load(args) => run_load(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "mlt-loader",
    about = "Load MLT tiles into typed, georeferenced collections",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load one or more tiles and print the resulting collections.
    Load(LoadArgs),
}

#[cfg(test)]
mod tests;
