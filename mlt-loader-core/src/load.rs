//! Entry points: decode tiles, group their features, and build collections.
//!
//! Per-tile and per-feature problems are collected as [`LoadIssue`]s next to
//! the output. A load only fails when there is no input, when no tile could
//! be decoded, when a single-tile load cannot decode its one tile, or when
//! mixed references are rejected.

use std::fmt;
use std::str::FromStr;

use log::warn;
use thiserror::Error;

use crate::address::{TileAddress, TileScheme};
use crate::collection::{CollectionError, Crs, DroppedFeature, OutputCollection, build};
use crate::decode::{DecodeError, TileDecoder};
use crate::group::{Bucket, Grouping, GroupingIssue, TileLayers, group_merged, group_single};
use crate::schema::discover;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Policy for merged loads mixing addressed and unaddressed tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MixedReferences {
    /// Merge them; affected collections carry no CRS.
    #[default]
    Permit,
    /// Fail the load.
    Reject,
}

impl MixedReferences {
    /// Lowercase name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Permit => "permit",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for MixedReferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MixedReferences {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "permit" => Ok(Self::Permit),
            "reject" => Ok(Self::Reject),
            _ => Err(format!("unknown mixed reference policy '{s}'")),
        }
    }
}

/// Options shared by every load entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoadOptions {
    /// Row convention applied to every supplied address.
    pub scheme: TileScheme,
    /// Handling of merged loads mixing addressed and unaddressed tiles.
    pub mixed_references: MixedReferences,
}

/// Tile bytes with a label and an optional pyramid address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileInput {
    /// Label used in names and issues, usually the file stem.
    pub label: String,
    /// Raw tile payload.
    pub bytes: Vec<u8>,
    /// Pyramid address; `None` keeps tile-local coordinates.
    pub address: Option<TileAddress>,
}

impl TileInput {
    /// Create an input.
    #[must_use]
    pub fn new(label: impl Into<String>, bytes: Vec<u8>, address: Option<TileAddress>) -> Self {
        Self {
            label: label.into(),
            bytes,
            address,
        }
    }
}

/// A non-fatal problem reported alongside a load's output.
#[derive(Debug, Error)]
pub enum LoadIssue {
    /// A tile's bytes could not be read.
    #[error("tile '{tile}' could not be read: {source}")]
    Unreadable {
        /// Label of the tile.
        tile: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A tile could not be decoded and was skipped.
    #[error("tile '{tile}' could not be decoded: {source}")]
    Decode {
        /// Label of the tile.
        tile: String,
        /// Decoder error.
        #[source]
        source: DecodeError,
    },
    /// A feature was left out of grouping.
    #[error(transparent)]
    Grouping(#[from] GroupingIssue),
    /// A feature was left out of its collection.
    #[error(transparent)]
    Dropped(#[from] DroppedFeature),
    /// A bucket could not become a collection.
    #[error(transparent)]
    Collection(#[from] CollectionError),
    /// A collection mixes placed and tile-local features and has no CRS.
    #[error("collection '{collection}' mixes georeferenced and tile-local features")]
    MixedReferences {
        /// Name of the collection.
        collection: String,
    },
}

/// Errors that fail a load as a whole.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The only tile of a single-tile load could not be decoded.
    #[error("tile '{tile}' could not be decoded: {source}")]
    Decode {
        /// Label of the tile.
        tile: String,
        /// Decoder error.
        #[source]
        source: DecodeError,
    },
    /// No tile was supplied.
    #[error("no tiles were supplied")]
    NoInput,
    /// Every supplied tile failed.
    #[error("none of the {} tiles could be loaded", failures.len())]
    NoTileDecoded {
        /// Why each tile failed.
        failures: Vec<LoadIssue>,
    },
    /// Addressed and unaddressed tiles were mixed under [`MixedReferences::Reject`].
    #[error("{placed} addressed and {unplaced} unaddressed tiles cannot be merged")]
    MixedReferences {
        /// Number of addressed tiles.
        placed: usize,
        /// Number of unaddressed tiles.
        unplaced: usize,
        /// Read and decode problems met before the load was refused.
        issues: Vec<LoadIssue>,
    },
}

/// Collections produced by a load plus everything that went wrong.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Collections in emission order.
    pub collections: Vec<OutputCollection>,
    /// Non-fatal problems.
    pub issues: Vec<LoadIssue>,
    /// Tiles that decoded.
    pub tiles_loaded: usize,
    /// Tiles that could not be read or decoded.
    pub tiles_failed: usize,
}

impl LoadReport {
    /// Whether no collection was produced; a valid outcome, not an error.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Whether any collection is in Web Mercator.
    #[must_use]
    pub fn is_georeferenced(&self) -> bool {
        self.collections
            .iter()
            .any(|collection| collection.crs.is_some())
    }

    /// Start a report for a batch whose listed tiles could not be read.
    ///
    /// Hand the result to [`load_merged_into`] or [`load_separately_into`]
    /// so that those tiles count as supplied and failed.
    #[must_use]
    pub fn with_unreadable<I, S>(unreadable: I) -> Self
    where
        I: IntoIterator<Item = (S, std::io::Error)>,
        S: Into<String>,
    {
        let mut report = Self::default();
        for (tile, source) in unreadable {
            report.record_unreadable(tile, source);
        }
        report
    }

    fn record_unreadable(&mut self, tile: impl Into<String>, source: std::io::Error) {
        self.tiles_failed += 1;
        self.issues.push(LoadIssue::Unreadable {
            tile: tile.into(),
            source,
        });
    }

    /// Record a tile that failed to decode.
    fn record_undecodable(&mut self, tile: &str, source: DecodeError) {
        warn!("skipping tile '{tile}': {source}");
        self.tiles_failed += 1;
        self.issues.push(LoadIssue::Decode {
            tile: tile.to_owned(),
            source,
        });
    }

    /// Absorb a grouping: build each bucket and collect the issues.
    fn absorb(&mut self, grouping: Grouping, crs: Option<Crs>) {
        let Grouping { buckets, issues } = grouping;
        self.issues.extend(issues.into_iter().map(LoadIssue::from));
        for bucket in buckets {
            self.build_bucket(bucket, crs);
        }
    }

    fn build_bucket(&mut self, bucket: Bucket, crs: Option<Crs>) {
        let Bucket {
            key,
            name,
            features,
        } = bucket;
        let placed = features.iter().filter(|f| f.placement.is_some()).count();
        if placed > 0 && placed < features.len() {
            warn!("collection '{name}' mixes georeferenced and tile-local features");
            self.issues.push(LoadIssue::MixedReferences {
                collection: name.clone(),
            });
        }
        let schema = discover(features.iter().map(|placed_feature| &placed_feature.feature));
        match build(&name, key.kind, features, &schema, crs) {
            Ok(built) => {
                self.issues
                    .extend(built.dropped.into_iter().map(LoadIssue::from));
                self.collections.push(built.collection);
            }
            Err(err) => {
                warn!("skipping collection '{name}': {err}");
                self.issues.push(LoadIssue::from(err));
            }
        }
    }

    /// Tiles accounted for so far, loaded or failed.
    const fn supplied(&self) -> usize {
        self.tiles_loaded + self.tiles_failed
    }

    /// Totals for a one-line status message.
    #[must_use]
    pub fn summary(&self) -> LoadSummary {
        LoadSummary {
            layers: self.collections.len(),
            files: self.supplied(),
            georeferenced: self.is_georeferenced(),
        }
    }

    fn into_result(self) -> Result<Self, LoadError> {
        if self.tiles_loaded == 0 {
            return Err(LoadError::NoTileDecoded {
                failures: self.issues,
            });
        }
        Ok(self)
    }
}

/// Counts behind the status line of a [`LoadReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LoadSummary {
    /// Collections produced.
    pub layers: usize,
    /// Tiles supplied.
    pub files: usize,
    /// Whether any collection is georeferenced.
    pub georeferenced: bool,
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.layers == 0 {
            return f.write_str("No layers found in the MLT file(s).");
        }
        let source = if self.files == 1 {
            "file".to_owned()
        } else {
            format!("{} files", self.files)
        };
        let placement = if self.georeferenced {
            "georeferenced"
        } else {
            "raw tile coords"
        };
        write!(
            f,
            "Loaded {} layer(s) from {source} ({placement})",
            self.layers
        )
    }
}

fn crs_for(address: Option<&TileAddress>) -> Option<Crs> {
    address.map(|_| Crs::WebMercator)
}

fn addressed(tile: &TileInput, options: &LoadOptions) -> Option<TileAddress> {
    tile.address.map(|address| address.with_scheme(options.scheme))
}

/// Load one tile. Buckets are scoped to the tile.
///
/// # Errors
/// Returns [`LoadError::Decode`] when the tile cannot be decoded.
pub fn load_single<D>(
    decoder: &D,
    tile: &TileInput,
    options: &LoadOptions,
) -> Result<LoadReport, LoadError>
where
    D: TileDecoder + ?Sized,
{
    let layers = decoder
        .decode(&tile.bytes)
        .map_err(|source| LoadError::Decode {
            tile: tile.label.clone(),
            source,
        })?;
    let address = addressed(tile, options);
    let mut report = LoadReport {
        tiles_loaded: 1,
        ..LoadReport::default()
    };
    report.absorb(
        group_single(TileLayers::new(tile.label.as_str(), address, layers)),
        crs_for(address.as_ref()),
    );
    Ok(report)
}

/// Load many tiles into global buckets shared across tiles.
///
/// Undecodable tiles are skipped and reported.
///
/// # Errors
/// Returns [`LoadError::NoInput`] for an empty batch,
/// [`LoadError::NoTileDecoded`] when every tile fails, and
/// [`LoadError::MixedReferences`] when addressed and unaddressed tiles are
/// mixed under [`MixedReferences::Reject`].
pub fn load_merged<D>(
    decoder: &D,
    tiles: &[TileInput],
    options: &LoadOptions,
) -> Result<LoadReport, LoadError>
where
    D: TileDecoder + ?Sized,
{
    load_merged_into(LoadReport::default(), decoder, tiles, options)
}

/// [`load_merged`] continuing a report that already holds unreadable tiles.
///
/// Tiles recorded in `report` count towards the `"<N> tiles"` label and the
/// summary, and their issues are kept in any error.
///
/// # Errors
/// As [`load_merged`], where the batch is empty only if `report` records no
/// failed tile either.
pub fn load_merged_into<D>(
    mut report: LoadReport,
    decoder: &D,
    tiles: &[TileInput],
    options: &LoadOptions,
) -> Result<LoadReport, LoadError>
where
    D: TileDecoder + ?Sized,
{
    let supplied = report.supplied() + tiles.len();
    if supplied == 0 {
        return Err(LoadError::NoInput);
    }
    let mut decoded = Vec::with_capacity(tiles.len());
    for tile in tiles {
        match decoder.decode(&tile.bytes) {
            Ok(layers) => decoded.push(TileLayers::new(
                tile.label.as_str(),
                addressed(tile, options),
                layers,
            )),
            Err(source) => report.record_undecodable(&tile.label, source),
        }
    }
    report.tiles_loaded += decoded.len();

    let placed = decoded.iter().filter(|t| t.address.is_some()).count();
    let unplaced = decoded.len() - placed;
    if placed > 0 && unplaced > 0 && options.mixed_references == MixedReferences::Reject {
        return Err(LoadError::MixedReferences {
            placed,
            unplaced,
            issues: report.issues,
        });
    }
    let crs = (placed > 0).then_some(Crs::WebMercator);
    report.absorb(group_merged(decoded, supplied), crs);
    report.into_result()
}

/// Load many tiles, each grouped on its own as in [`load_single`].
///
/// Undecodable tiles are skipped and reported.
///
/// # Errors
/// Returns [`LoadError::NoInput`] for an empty batch and
/// [`LoadError::NoTileDecoded`] when every tile fails.
pub fn load_separately<D>(
    decoder: &D,
    tiles: &[TileInput],
    options: &LoadOptions,
) -> Result<LoadReport, LoadError>
where
    D: TileDecoder + ?Sized,
{
    load_separately_into(LoadReport::default(), decoder, tiles, options)
}

/// [`load_separately`] continuing a report that already holds unreadable
/// tiles.
///
/// # Errors
/// As [`load_separately`], where the batch is empty only if `report`
/// records no failed tile either.
pub fn load_separately_into<D>(
    mut report: LoadReport,
    decoder: &D,
    tiles: &[TileInput],
    options: &LoadOptions,
) -> Result<LoadReport, LoadError>
where
    D: TileDecoder + ?Sized,
{
    if report.supplied() + tiles.len() == 0 {
        return Err(LoadError::NoInput);
    }
    for tile in tiles {
        match decoder.decode(&tile.bytes) {
            Ok(layers) => {
                let address = addressed(tile, options);
                report.tiles_loaded += 1;
                report.absorb(
                    group_single(TileLayers::new(tile.label.as_str(), address, layers)),
                    crs_for(address.as_ref()),
                );
            }
            Err(source) => report.record_undecodable(&tile.label, source),
        }
    }
    report.into_result()
}
