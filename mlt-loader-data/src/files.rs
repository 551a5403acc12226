//! Load tile files from disk: detect addresses, read bytes, pick a mode.

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use mlt_loader_core::{
    LoadError, LoadOptions, LoadReport, TileAddress, TileDecoder, TileInput, TileScheme,
    load_merged_into, load_separately_into, load_single, parse_address,
};
use mlt_loader_fs::read_tile_bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A tile file and the address it will be loaded at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileFile {
    /// Path to the tile.
    pub path: Utf8PathBuf,
    /// Address, if detected or supplied.
    pub address: Option<TileAddress>,
}

impl TileFile {
    /// Pair a path with an address.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, address: Option<TileAddress>) -> Self {
        Self {
            path: path.into(),
            address,
        }
    }

    /// Label used in collection names: the file stem.
    #[must_use]
    pub fn label(&self) -> &str {
        self.path.file_stem().unwrap_or_else(|| self.path.as_str())
    }
}

/// How many files had an address detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectionSummary {
    /// Files with an address.
    pub detected: usize,
    /// Files inspected.
    pub total: usize,
}

impl DetectionSummary {
    /// Count the addressed files.
    #[must_use]
    pub fn of(files: &[TileFile]) -> Self {
        Self {
            detected: files.iter().filter(|file| file.address.is_some()).count(),
            total: files.len(),
        }
    }
}

impl fmt::Display for DetectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Coordinates auto-detected for {}/{} files.",
            self.detected, self.total
        )
    }
}

/// Detect a tile address for each path under `scheme`.
///
/// # Examples
/// ```
/// use mlt_loader_core::TileScheme;
/// use mlt_loader_data::detect_addresses;
///
/// let files = detect_addresses(["tiles/14_8297_10749.mlt", "random.mlt"], TileScheme::Tms);
/// assert!(files[0].address.is_some());
/// assert!(files[1].address.is_none());
/// ```
#[must_use]
pub fn detect_addresses<I, P>(paths: I, scheme: TileScheme) -> Vec<TileFile>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Utf8Path>,
{
    paths
        .into_iter()
        .map(|candidate| {
            let path = candidate.as_ref();
            let address = parse_address(path.as_str()).map(|found| found.with_scheme(scheme));
            match &address {
                Some(found) => debug!("{path}: detected tile {found}"),
                None => debug!("{path}: no tile address in path"),
            }
            TileFile::new(path, address)
        })
        .collect()
}

/// Whether many tiles share buckets or are loaded one by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Same-named layers merge across tiles.
    #[default]
    Merged,
    /// Each tile keeps its own collections.
    Separate,
}

impl FromStr for LoadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "merged" => Ok(Self::Merged),
            "separate" => Ok(Self::Separate),
            _ => Err(format!("unknown load mode '{s}'")),
        }
    }
}

/// Errors that fail a file load as a whole.
#[derive(Debug, Error)]
pub enum FilesError {
    /// No file was supplied.
    #[error("no tile files were supplied")]
    NoFiles,
    /// The core load failed.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Read and load `files`.
///
/// One file is loaded on its own; several follow `mode`. Unreadable files are
/// reported in the returned [`LoadReport`], count towards its totals and the
/// merged `"<N> tiles"` label, and do not stop the others.
///
/// # Errors
/// Returns [`FilesError::NoFiles`] for an empty list and
/// [`FilesError::Load`] when nothing could be read and decoded.
pub fn load_files<D>(
    decoder: &D,
    files: &[TileFile],
    mode: LoadMode,
    options: &LoadOptions,
) -> Result<LoadReport, FilesError>
where
    D: TileDecoder + ?Sized,
{
    if files.is_empty() {
        return Err(FilesError::NoFiles);
    }

    let mut inputs = Vec::with_capacity(files.len());
    let mut unreadable = Vec::new();
    for file in files {
        match read_tile_bytes(&file.path) {
            Ok(bytes) => inputs.push(TileInput::new(file.label(), bytes, file.address)),
            Err(err) => {
                warn!("skipping unreadable tile {}: {err}", file.path);
                unreadable.push((file.label().to_owned(), err));
            }
        }
    }

    let outcome = match (files, inputs.as_slice()) {
        ([_], [tile]) => load_single(decoder, tile, options),
        _ => {
            let report = LoadReport::with_unreadable(unreadable);
            match mode {
                LoadMode::Merged => load_merged_into(report, decoder, &inputs, options),
                LoadMode::Separate => load_separately_into(report, decoder, &inputs, options),
            }
        }
    };
    outcome.map_err(FilesError::from)
}
