//! File access and tile decoding adapters for the MLT loader.
//!
//! Responsibilities:
//! - Detect tile addresses from file paths.
//! - Read tile files and hand their bytes to a [`TileDecoder`].
//! - Provide a JSON dump decoder for tools and fixtures.
//!
//! Boundaries:
//! - Do not encode grouping or schema rules (live in `mlt-loader-core`).
//! - Do not decide how results are presented (lives in `mlt-loader-cli`).
//!
//! Invariants:
//! - A file that cannot be read is reported and never aborts the batch.
//! - No global mutable state.
//!
//! [`TileDecoder`]: mlt_loader_core::TileDecoder

mod files;
mod json;

pub use files::{DetectionSummary, FilesError, LoadMode, TileFile, detect_addresses, load_files};
pub use json::JsonTileDecoder;
