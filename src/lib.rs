//! Facade crate for the MLT tile loader.
//!
//! This crate re-exports the core loading types and exposes the file and JSON
//! decoding adapters behind the `data` feature.

#![forbid(unsafe_code)]

pub use mlt_loader_core::{
    BuiltCollection, Crs, DecodeError, DecodedLayer, GeometryKind, LoadError, LoadIssue,
    LoadOptions, LoadReport, LoadSummary, MixedReferences, MultiGeometry, OutputCollection,
    Properties, PropertyValue, RawFeature, Schema, TileAddress, TileDecoder, TileInput,
    TileScheme, TypedFeature, ValueKind, load_merged, load_merged_into, load_separately,
    load_separately_into, load_single, parse_address,
};

#[cfg(feature = "data")]
pub use mlt_loader_data::{
    DetectionSummary, FilesError, JsonTileDecoder, LoadMode, TileFile, detect_addresses,
    load_files,
};
