//! Feature grouping for one tile or merged across many.
//!
//! Features are bucketed by layer name and canonical geometry kind. A
//! single-tile grouping keeps buckets in first-seen order; a merged grouping
//! sorts them by layer name then kind name. In both modes a feature's tile
//! placement is fixed when it enters its bucket, so one merged bucket may
//! mix features from differently placed, or unplaced, tiles.

mod accumulator;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use geo::AffineTransform;
use thiserror::Error;

use crate::address::TileAddress;
use crate::decode::{DecodedLayer, RawFeature};
use crate::geometry::{GeometryKind, UnknownGeometryKind};
use accumulator::BucketAccumulator;

/// Separator between the tile label and the layer name in bucket names.
const NAME_SEPARATOR: &str = " \u{2014} ";

/// Composite key of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// Layer name as reported by the decoder.
    pub layer: String,
    /// Canonical (multi-part) geometry kind.
    pub kind: GeometryKind,
}

impl BucketKey {
    /// Build a key, canonicalising `kind`.
    #[must_use]
    pub fn new(layer: &str, kind: GeometryKind) -> Self {
        Self {
            layer: layer.to_owned(),
            kind: kind.canonical(),
        }
    }
}

impl Ord for BucketKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.layer
            .cmp(&other.layer)
            .then_with(|| self.kind.as_str().cmp(other.kind.as_str()))
    }
}

impl PartialOrd for BucketKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.layer, self.kind)
    }
}

/// A feature together with the transform of the tile it came from.
///
/// `placement` is `None` for tiles without an address; such features stay
/// in tile-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedFeature {
    /// The decoded feature.
    pub feature: RawFeature,
    /// Tile-local to Web Mercator transform, if the tile was addressed.
    pub placement: Option<AffineTransform<f64>>,
}

/// One decoded tile handed to the grouping stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayers {
    /// Label used in bucket names and issues, usually the file stem.
    pub label: String,
    /// Pyramid address, if known.
    pub address: Option<TileAddress>,
    /// Layers as produced by the decoder.
    pub layers: Vec<DecodedLayer>,
}

impl TileLayers {
    /// Bundle a decoded tile with its label and address.
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        address: Option<TileAddress>,
        layers: Vec<DecodedLayer>,
    ) -> Self {
        Self {
            label: label.into(),
            address,
            layers,
        }
    }
}

/// A non-empty group of features sharing a [`BucketKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Grouping key.
    pub key: BucketKey,
    /// Display name of the collection this bucket becomes.
    pub name: String,
    /// Features in arrival order.
    pub features: Vec<PlacedFeature>,
}

/// A feature left out of grouping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupingIssue {
    /// The feature's geometry tag names no supported kind.
    #[error("tile '{tile}' layer '{layer}': {source}")]
    UnknownGeometryKind {
        /// Label of the tile the feature came from.
        tile: String,
        /// Layer the feature belonged to.
        layer: String,
        /// The rejected tag.
        #[source]
        source: UnknownGeometryKind,
    },
}

/// Result of grouping: named buckets plus dropped-feature issues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grouping {
    /// Buckets in emission order.
    pub buckets: Vec<Bucket>,
    /// Features that could not be grouped.
    pub issues: Vec<GroupingIssue>,
}

impl Grouping {
    fn from_slots(
        slots: Vec<(BucketKey, Vec<PlacedFeature>)>,
        issues: Vec<GroupingIssue>,
        label: &str,
    ) -> Self {
        let ambiguous = layers_with_several_kinds(slots.iter().map(|(key, _)| key));
        let buckets = slots
            .into_iter()
            .map(|(key, features)| Bucket {
                name: display_name(label, &key, ambiguous.contains(&key.layer)),
                key,
                features,
            })
            .collect();
        Self { buckets, issues }
    }

    /// Whether no bucket was produced.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of grouped features.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.features.len()).sum()
    }
}

fn layers_with_several_kinds<'a, I>(keys: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a BucketKey>,
{
    let mut kinds_per_layer: HashMap<&str, usize> = HashMap::new();
    for key in keys {
        *kinds_per_layer.entry(key.layer.as_str()).or_default() += 1;
    }
    kinds_per_layer
        .into_iter()
        .filter(|(_, kinds)| *kinds > 1)
        .map(|(layer, _)| layer.to_owned())
        .collect()
}

fn display_name(label: &str, key: &BucketKey, disambiguate: bool) -> String {
    if disambiguate {
        format!("{label}{NAME_SEPARATOR}{} ({})", key.layer, key.kind)
    } else {
        format!("{label}{NAME_SEPARATOR}{}", key.layer)
    }
}

/// Group the features of one tile.
///
/// Buckets are scoped to the tile and named `"<label> — <layer>"`, with the
/// canonical kind appended when the layer produced more than one bucket.
///
/// # Examples
/// ```
/// use mlt_loader_core::{DecodedLayer, RawFeature, TileLayers, group_single};
///
/// let layer = DecodedLayer::new("water", vec![RawFeature::new("Polygon", Vec::new())]);
/// let grouping = group_single(TileLayers::new("t1", None, vec![layer]));
/// assert_eq!(grouping.buckets[0].name, "t1 \u{2014} water");
/// ```
#[must_use]
pub fn group_single(tile: TileLayers) -> Grouping {
    let label = tile.label.clone();
    let (slots, issues) = BucketAccumulator::for_tile(tile).into_parts();
    Grouping::from_slots(slots, issues, &label)
}

/// Group the features of many tiles into global buckets.
///
/// Buckets are sorted by layer name then kind name and labelled
/// `"<N> tiles — <layer>"`, where `N` is `tiles_supplied`: every tile handed
/// to the load, including those that could not be read or decoded. The kind
/// is appended when the layer name maps to more than one bucket overall.
#[must_use]
pub fn group_merged<I>(tiles: I, tiles_supplied: usize) -> Grouping
where
    I: IntoIterator<Item = TileLayers>,
{
    let merged = tiles
        .into_iter()
        .map(BucketAccumulator::for_tile)
        .fold(BucketAccumulator::default(), BucketAccumulator::combine);
    let (mut slots, issues) = merged.into_parts();
    slots.sort_by(|(left, _), (right, _)| left.cmp(right));
    Grouping::from_slots(slots, issues, &format!("{tiles_supplied} tiles"))
}
