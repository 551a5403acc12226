//! Error types emitted by the loader CLI.
//!
//! Keep this error type reasonably small, as every CLI helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use mlt_loader_core::TileAddressError;
use mlt_loader_data::FilesError;
use thiserror::Error;

/// Errors emitted by the loader CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// An option value is not one of the accepted spellings.
    #[error("invalid --{field} value: {reason}")]
    InvalidOption { field: &'static str, reason: String },
    /// The `--tile` override is not a valid address.
    #[error("invalid --tile value '{value}': {source}")]
    InvalidTile {
        value: String,
        #[source]
        source: TileAddressError,
    },
    /// The `--tile` override was given alongside several paths.
    #[error("--tile applies to a single file, but {count} paths were given")]
    TileNeedsSinglePath { count: usize },
    /// Loading the tiles failed as a whole.
    #[error("failed to load tiles: {0}")]
    Load(#[from] FilesError),
    /// Creating the report file failed.
    #[error("failed to create output file {path:?}: {source}")]
    CreateOutput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Serializing the load report failed.
    #[error("failed to serialize load report: {0}")]
    SerializeReport(#[source] serde_json::Error),
    /// Writing the load report failed.
    #[error("failed to write load report: {0}")]
    WriteReport(#[source] std::io::Error),
}
