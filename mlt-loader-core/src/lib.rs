//! Core domain types for turning decoded MapLibre Tile (MLT) layers into
//! feature collections.
//!
//! Responsibilities:
//! - Resolve tile pyramid addresses and the transform from tile-local
//!   coordinates to Web Mercator metres.
//! - Bucket features by layer name and canonical (multi-part) geometry kind,
//!   for one tile or merged across many.
//! - Discover a typed attribute schema per bucket and build collections.
//!
//! Boundaries:
//! - The MLT binary codec is an external collaborator behind [`TileDecoder`].
//! - No filesystem access; callers hand over tile bytes.
//!
//! Invariants:
//! - Features sharing a layer name and canonical geometry kind always land in
//!   the same bucket.
//! - Per-tile and per-feature problems are reported next to the output and
//!   never abort unrelated work.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod address;
pub mod collection;
pub mod decode;
pub mod geometry;
pub mod group;
pub mod load;
pub mod schema;
pub mod value;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use address::{
    DEFAULT_EXTENT, MAX_ZOOM, TileAddress, TileAddressError, TileScheme, compute_transform,
    parse_address,
};
pub use collection::{
    BuiltCollection, CollectionError, Crs, DroppedFeature, OutputCollection, TypedFeature, build,
};
pub use decode::{DecodeError, DecodedLayer, RawFeature, TileDecoder};
pub use geometry::{
    GeometryError, GeometryKind, MultiGeometry, UnknownGeometryKind, canonicalize,
    decode_geometry,
};
pub use group::{
    Bucket, BucketKey, Grouping, GroupingIssue, PlacedFeature, TileLayers, group_merged,
    group_single,
};
pub use load::{
    LoadError, LoadIssue, LoadOptions, LoadReport, LoadSummary, MixedReferences, TileInput,
    load_merged, load_merged_into, load_separately, load_separately_into, load_single,
};
pub use schema::{Field, Schema, discover};
pub use value::{Properties, PropertyValue, ValueKind};
