//! Test-only helpers: WKB feature builders and an in-memory `TileDecoder`.

use std::collections::HashMap;

use geo::{Geometry, LineString, Point, Polygon, Rect, coord};
use geozero::{CoordDimensions, ToWkb};

use crate::{DecodeError, DecodedLayer, RawFeature, TileDecoder};

/// Encode a geometry as 2D WKB.
///
/// # Panics
/// Panics if `geozero` cannot encode the geometry.
#[must_use]
#[expect(clippy::expect_used, reason = "test helper; encoding geo types cannot fail")]
pub fn wkb(geometry: impl Into<Geometry<f64>>) -> Vec<u8> {
    geometry
        .into()
        .to_wkb(CoordDimensions::xy())
        .expect("geo geometry encodes as WKB")
}

/// A `"Point"` feature at `(x, y)`.
#[must_use]
pub fn point_feature(x: f64, y: f64) -> RawFeature {
    RawFeature::new("Point", wkb(Point::new(x, y)))
}

/// A `"LineString"` feature through `coords`.
#[must_use]
pub fn line_feature(coords: &[(f64, f64)]) -> RawFeature {
    RawFeature::new("LineString", wkb(LineString::from(coords.to_vec())))
}

/// A `"Polygon"` feature: the square of side `size` anchored at `(x, y)`.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "corner arithmetic for fixtures")]
pub fn polygon_feature(x: f64, y: f64, size: f64) -> RawFeature {
    let square: Polygon<f64> =
        Rect::new(coord! { x: x, y: y }, coord! { x: x + size, y: y + size }).to_polygon();
    RawFeature::new("Polygon", wkb(square))
}

/// In-memory `TileDecoder` keyed by the exact payload bytes.
///
/// Unknown payloads decode as [`DecodeError::Corrupt`].
#[derive(Debug, Default, Clone)]
pub struct MemoryDecoder {
    tiles: HashMap<Vec<u8>, Vec<DecodedLayer>>,
}

impl MemoryDecoder {
    /// Register the layers returned for `bytes`.
    #[must_use]
    pub fn with_tile(mut self, bytes: &[u8], layers: Vec<DecodedLayer>) -> Self {
        self.tiles.insert(bytes.to_vec(), layers);
        self
    }
}

impl TileDecoder for MemoryDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedLayer>, DecodeError> {
        self.tiles
            .get(bytes)
            .cloned()
            .ok_or_else(|| DecodeError::Corrupt {
                reason: format!("no tile registered for {} byte payload", bytes.len()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn memory_decoder_returns_registered_layers() {
        let decoder = MemoryDecoder::default()
            .with_tile(b"a", vec![DecodedLayer::new("roads", Vec::new())]);
        let layers = decoder.decode(b"a").expect("registered payload");
        assert_eq!(layers.len(), 1);
        assert!(matches!(
            decoder.decode(b"b"),
            Err(DecodeError::Corrupt { .. })
        ));
    }
}
