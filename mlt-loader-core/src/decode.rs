//! The seam between the loader and an MLT binary decoder.
//!
//! The loader never parses MLT payloads itself. A [`TileDecoder`] turns tile
//! bytes into [`DecodedLayer`]s whose features carry a textual geometry tag,
//! WKB geometry bytes in tile-local coordinates, and scalar attributes.

use thiserror::Error;

use crate::address::DEFAULT_EXTENT;
use crate::geometry::{GeometryKind, UnknownGeometryKind};
use crate::value::{Properties, PropertyValue};

/// A feature exactly as the decoder produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// Optional feature identifier.
    pub id: Option<u64>,
    /// Geometry tag such as `"Point"` or `"MultiPolygon"`.
    pub geometry_type: String,
    /// 2D WKB geometry in tile-local coordinates.
    pub geometry: Vec<u8>,
    /// Attributes in decoder order.
    pub properties: Properties,
}

impl RawFeature {
    /// Create a feature without an id or attributes.
    #[must_use]
    pub fn new(geometry_type: impl Into<String>, geometry: Vec<u8>) -> Self {
        Self {
            id: None,
            geometry_type: geometry_type.into(),
            geometry,
            properties: Properties::new(),
        }
    }

    /// Attach an identifier.
    #[must_use]
    pub const fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Attach or replace an attribute.
    #[must_use]
    pub fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name, value);
        self
    }

    /// Parse the geometry tag.
    ///
    /// # Errors
    /// Returns [`UnknownGeometryKind`] when the tag names none of the six
    /// supported kinds.
    pub fn geometry_kind(&self) -> Result<GeometryKind, UnknownGeometryKind> {
        self.geometry_type.parse()
    }
}

/// One named layer of a decoded tile.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLayer {
    /// Layer name, e.g. `"roads"`.
    pub name: String,
    /// Size of the tile-local coordinate grid.
    pub extent: u32,
    /// Features in decoder order.
    pub features: Vec<RawFeature>,
}

impl DecodedLayer {
    /// Create a layer with the default 4096 extent.
    #[must_use]
    pub fn new(name: impl Into<String>, features: Vec<RawFeature>) -> Self {
        Self {
            name: name.into(),
            extent: DEFAULT_EXTENT,
            features,
        }
    }

    /// Override the tile-local extent.
    #[must_use]
    pub const fn with_extent(mut self, extent: u32) -> Self {
        self.extent = extent;
        self
    }
}

/// Errors a [`TileDecoder`] may report for a payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is malformed.
    #[error("corrupt tile payload: {reason}")]
    Corrupt {
        /// Description of the defect.
        reason: String,
    },
    /// The payload uses an encoding the decoder does not implement.
    #[error("unsupported tile payload: {reason}")]
    Unsupported {
        /// Description of the unsupported feature.
        reason: String,
    },
    /// Any other failure raised by the decoder implementation.
    #[error("tile decoder failed: {0}")]
    Decoder(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Decode MLT tile bytes into layers.
///
/// Implementations must be `Send + Sync` so tiles can be decoded on worker
/// threads ahead of the single-threaded grouping pass.
pub trait TileDecoder: Send + Sync {
    /// Decode one tile payload.
    ///
    /// # Errors
    /// Returns [`DecodeError`] when the payload cannot be decoded.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedLayer>, DecodeError>;
}

impl<T: TileDecoder + ?Sized> TileDecoder for &T {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedLayer>, DecodeError> {
        (**self).decode(bytes)
    }
}
