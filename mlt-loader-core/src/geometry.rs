//! Geometry kinds, canonicalisation, and the multi-part target geometry.
//!
//! Features are grouped by the *canonical* kind of their geometry: single-part
//! kinds are promoted to their multi-part family so that a layer mixing
//! `Point` and `MultiPoint` features yields one collection, not two.
//!
//! # Examples
//! ```
//! use mlt_loader_core::{GeometryKind, canonicalize};
//!
//! assert_eq!(canonicalize(GeometryKind::Polygon), GeometryKind::MultiPolygon);
//! assert_eq!(canonicalize(GeometryKind::MultiPoint), GeometryKind::MultiPoint);
//! ```

use std::str::FromStr;

use geo::{
    AffineOps, AffineTransform, BoundingRect, Geometry, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Rect,
};
use geozero::ToGeo;
use geozero::error::GeozeroError;
use geozero::wkb::Wkb;
use thiserror::Error;

/// The six geometry kinds a tile feature may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeometryKind {
    /// A single position.
    Point,
    /// A single connected path.
    LineString,
    /// A single polygon with optional holes.
    Polygon,
    /// Several positions.
    MultiPoint,
    /// Several paths.
    MultiLineString,
    /// Several polygons.
    MultiPolygon,
}

impl GeometryKind {
    /// Every kind, single-part kinds first.
    pub const ALL: [Self; 6] = [
        Self::Point,
        Self::LineString,
        Self::Polygon,
        Self::MultiPoint,
        Self::MultiLineString,
        Self::MultiPolygon,
    ];

    /// Return the multi-part kind of this kind's family.
    #[must_use]
    pub const fn canonical(self) -> Self {
        match self {
            Self::Point | Self::MultiPoint => Self::MultiPoint,
            Self::LineString | Self::MultiLineString => Self::MultiLineString,
            Self::Polygon | Self::MultiPolygon => Self::MultiPolygon,
        }
    }

    /// Whether this kind is already multi-part.
    #[must_use]
    pub const fn is_multi(self) -> bool {
        matches!(
            self,
            Self::MultiPoint | Self::MultiLineString | Self::MultiPolygon
        )
    }

    /// Return the kind's name as used by the tile decoder.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
        }
    }
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A geometry tag outside the six recognised kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown geometry kind '{name}'")]
pub struct UnknownGeometryKind {
    /// Tag reported by the decoder.
    pub name: String,
}

impl FromStr for GeometryKind {
    type Err = UnknownGeometryKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownGeometryKind { name: s.to_owned() })
    }
}

/// Map a kind to the multi-part kind used as its grouping key.
///
/// Total over [`GeometryKind`] and idempotent.
#[must_use]
pub const fn canonicalize(kind: GeometryKind) -> GeometryKind {
    kind.canonical()
}

/// Errors raised while turning feature geometry bytes into a [`MultiGeometry`].
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The bytes were not valid WKB.
    #[error("failed to decode WKB geometry: {0}")]
    Wkb(#[source] GeozeroError),
    /// A WKB header declares more content than the payload holds, or a
    /// geometry type the reader does not know.
    #[error("malformed WKB geometry: {reason}")]
    Malformed {
        /// What did not fit.
        reason: String,
    },
    /// The geometry has no place in a point, line or polygon collection.
    #[error("{found} geometries cannot be stored in a collection")]
    Unsupported {
        /// Name of the offending geometry type.
        found: &'static str,
    },
    /// The decoded geometry belongs to a different family than its bucket.
    #[error("expected {expected} geometry, found {found}")]
    KindMismatch {
        /// Canonical kind of the bucket.
        expected: GeometryKind,
        /// Canonical kind of the decoded geometry.
        found: GeometryKind,
    },
}

/// Target geometry of collection features: always multi-part.
#[derive(Debug, Clone, PartialEq)]
pub enum MultiGeometry {
    /// Points, possibly promoted from a single point.
    MultiPoint(MultiPoint<f64>),
    /// Lines, possibly promoted from a single line string.
    MultiLineString(MultiLineString<f64>),
    /// Polygons, possibly promoted from a single polygon.
    MultiPolygon(MultiPolygon<f64>),
}

impl MultiGeometry {
    /// Wrap a geometry, upgrading single-part values to their multi-part form.
    ///
    /// # Errors
    /// Returns [`GeometryError::Unsupported`] for geometry collections.
    pub fn from_geometry(geometry: Geometry<f64>) -> Result<Self, GeometryError> {
        match geometry {
            Geometry::Point(point) => Ok(Self::MultiPoint(MultiPoint::new(vec![point]))),
            Geometry::MultiPoint(points) => Ok(Self::MultiPoint(points)),
            Geometry::Line(line) => Ok(Self::MultiLineString(MultiLineString::new(vec![
                LineString::from(line),
            ]))),
            Geometry::LineString(line) => {
                Ok(Self::MultiLineString(MultiLineString::new(vec![line])))
            }
            Geometry::MultiLineString(lines) => Ok(Self::MultiLineString(lines)),
            Geometry::Polygon(polygon) => Ok(Self::MultiPolygon(MultiPolygon::new(vec![polygon]))),
            Geometry::Rect(rect) => Ok(Self::MultiPolygon(MultiPolygon::new(vec![
                rect.to_polygon(),
            ]))),
            Geometry::Triangle(triangle) => Ok(Self::MultiPolygon(MultiPolygon::new(vec![
                triangle.to_polygon(),
            ]))),
            Geometry::MultiPolygon(polygons) => Ok(Self::MultiPolygon(polygons)),
            Geometry::GeometryCollection(_) => Err(GeometryError::Unsupported {
                found: "GeometryCollection",
            }),
        }
    }

    /// Canonical kind of the wrapped geometry.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        match self {
            Self::MultiPoint(_) => GeometryKind::MultiPoint,
            Self::MultiLineString(_) => GeometryKind::MultiLineString,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    /// Number of parts (points, lines or polygons).
    #[must_use]
    pub fn part_count(&self) -> usize {
        match self {
            Self::MultiPoint(points) => points.0.len(),
            Self::MultiLineString(lines) => lines.0.len(),
            Self::MultiPolygon(polygons) => polygons.0.len(),
        }
    }

    /// Axis-aligned bounds, or `None` for an empty geometry.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Self::MultiPoint(points) => points.bounding_rect(),
            Self::MultiLineString(lines) => lines.bounding_rect(),
            Self::MultiPolygon(polygons) => polygons.bounding_rect(),
        }
    }

    /// Apply an affine transform to every coordinate in place.
    pub fn transform(&mut self, transform: &AffineTransform<f64>) {
        match self {
            Self::MultiPoint(points) => points.affine_transform_mut(transform),
            Self::MultiLineString(lines) => lines.affine_transform_mut(transform),
            Self::MultiPolygon(polygons) => polygons.affine_transform_mut(transform),
        }
    }
}

impl From<MultiGeometry> for Geometry<f64> {
    fn from(value: MultiGeometry) -> Self {
        match value {
            MultiGeometry::MultiPoint(points) => Self::MultiPoint(points),
            MultiGeometry::MultiLineString(lines) => Self::MultiLineString(lines),
            MultiGeometry::MultiPolygon(polygons) => Self::MultiPolygon(polygons),
        }
    }
}

/// Decode 2D WKB bytes into the multi-part target geometry.
///
/// Every count declared in the WKB headers is checked against the bytes that
/// follow it before the payload reaches the reader.
///
/// # Errors
/// Returns [`GeometryError::Malformed`] when a header declares more content
/// than the payload holds, [`GeometryError::Wkb`] for other malformed bytes,
/// and [`GeometryError::Unsupported`] for geometry collections.
pub fn decode_geometry(bytes: &[u8]) -> Result<MultiGeometry, GeometryError> {
    WkbHeaders { rest: bytes }.geometry(0)?;
    let geometry = Wkb(bytes.to_vec()).to_geo().map_err(GeometryError::Wkb)?;
    MultiGeometry::from_geometry(geometry)
}

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;
const MAX_WKB_DEPTH: usize = 32;
const PART_HEADER_BYTES: usize = 5;
const RING_HEADER_BYTES: usize = 4;

fn malformed(reason: impl Into<String>) -> GeometryError {
    GeometryError::Malformed {
        reason: reason.into(),
    }
}

/// Base type code (1 to 7) and coordinate width of a WKB type word.
fn wkb_layout(code: u32) -> Result<(u32, usize), GeometryError> {
    let iso = code & !(EWKB_Z | EWKB_M | EWKB_SRID);
    let (base, iso_dimensions) = match iso {
        1..=7 => (iso, 0),
        1001..=1007 => (iso - 1000, 1),
        2001..=2007 => (iso - 2000, 1),
        3001..=3007 => (iso - 3000, 2),
        _ => return Err(malformed(format!("unsupported WKB geometry type {code}"))),
    };
    let ewkb_dimensions = usize::from(code & EWKB_Z != 0) + usize::from(code & EWKB_M != 0);
    Ok((base, 8 * (2 + iso_dimensions + ewkb_dimensions)))
}

/// Walks WKB headers without building geometry.
struct WkbHeaders<'a> {
    rest: &'a [u8],
}

impl WkbHeaders<'_> {
    fn geometry(&mut self, depth: usize) -> Result<(), GeometryError> {
        if depth > MAX_WKB_DEPTH {
            return Err(malformed(format!(
                "geometry nested deeper than {MAX_WKB_DEPTH} levels"
            )));
        }
        let [order] = self.take::<1>("byte order")?;
        let little_endian = order != 0;
        let code = self.word(little_endian, "geometry type")?;
        let (base, coordinate_bytes) = wkb_layout(code)?;
        if code & EWKB_SRID != 0 {
            self.skip(4, "SRID")?;
        }
        match base {
            1 => self.skip(coordinate_bytes, "point"),
            2 => self.points(little_endian, coordinate_bytes),
            3 => {
                let rings = self.declared(little_endian, RING_HEADER_BYTES, "rings")?;
                (0..rings).try_for_each(|_| self.points(little_endian, coordinate_bytes))
            }
            _ => {
                let parts = self.declared(little_endian, PART_HEADER_BYTES, "parts")?;
                (0..parts).try_for_each(|_| self.geometry(depth + 1))
            }
        }
    }

    fn points(
        &mut self,
        little_endian: bool,
        coordinate_bytes: usize,
    ) -> Result<(), GeometryError> {
        let count = self.declared(little_endian, coordinate_bytes, "points")?;
        self.skip(count.saturating_mul(coordinate_bytes), "points")
    }

    /// Read a count and check that `count` elements of at least
    /// `min_bytes` each fit in what is left.
    fn declared(
        &mut self,
        little_endian: bool,
        min_bytes: usize,
        element: &str,
    ) -> Result<usize, GeometryError> {
        let word = self.word(little_endian, element)?;
        let remaining = self.rest.len();
        usize::try_from(word)
            .ok()
            .filter(|count| {
                count
                    .checked_mul(min_bytes)
                    .is_some_and(|needed| needed <= remaining)
            })
            .ok_or_else(|| {
                malformed(format!(
                    "declares {word} {element} but only {remaining} bytes remain"
                ))
            })
    }

    #[expect(
        clippy::little_endian_bytes,
        clippy::big_endian_bytes,
        reason = "WKB states its byte order per geometry"
    )]
    fn word(&mut self, little_endian: bool, element: &str) -> Result<u32, GeometryError> {
        let raw = self.take::<4>(element)?;
        Ok(if little_endian {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        })
    }

    fn take<const N: usize>(&mut self, element: &str) -> Result<[u8; N], GeometryError> {
        let rest = self.rest;
        let (head, tail) = rest
            .split_first_chunk::<N>()
            .ok_or_else(|| malformed(format!("payload ends before the {element}")))?;
        self.rest = tail;
        Ok(*head)
    }

    fn skip(&mut self, len: usize, element: &str) -> Result<(), GeometryError> {
        let rest = self.rest;
        self.rest = rest
            .get(len..)
            .ok_or_else(|| malformed(format!("payload ends inside the {element}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::wkb;
    use geo::{Coord, Point, Polygon, line_string, point, polygon};
    use rstest::rstest;

    #[rstest]
    #[case(GeometryKind::Point, GeometryKind::MultiPoint)]
    #[case(GeometryKind::LineString, GeometryKind::MultiLineString)]
    #[case(GeometryKind::Polygon, GeometryKind::MultiPolygon)]
    #[case(GeometryKind::MultiPoint, GeometryKind::MultiPoint)]
    #[case(GeometryKind::MultiLineString, GeometryKind::MultiLineString)]
    #[case(GeometryKind::MultiPolygon, GeometryKind::MultiPolygon)]
    fn canonicalises_to_multi_part(#[case] kind: GeometryKind, #[case] expected: GeometryKind) {
        assert_eq!(canonicalize(kind), expected);
        assert_eq!(canonicalize(canonicalize(kind)), expected);
        assert!(expected.is_multi());
    }

    #[rstest]
    fn names_round_trip_through_from_str() {
        for kind in GeometryKind::ALL {
            assert_eq!(kind.to_string().parse::<GeometryKind>(), Ok(kind));
        }
    }

    #[rstest]
    #[case("GeometryCollection")]
    #[case("point")]
    #[case("")]
    fn rejects_unknown_tags(#[case] tag: &str) {
        let err = tag.parse::<GeometryKind>().expect_err("tag should be rejected");
        assert_eq!(err.name, tag);
    }

    #[rstest]
    fn single_point_is_promoted() {
        let decoded = decode_geometry(&wkb(point!(x: 1.0, y: 2.0))).expect("valid WKB");
        assert_eq!(decoded.kind(), GeometryKind::MultiPoint);
        assert_eq!(decoded.part_count(), 1);
    }

    #[rstest]
    fn single_polygon_is_promoted() {
        let square: Polygon<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 4.0),
            (x: 0.0, y: 4.0),
        ];
        let decoded = decode_geometry(&wkb(square)).expect("valid WKB");
        assert_eq!(decoded.kind(), GeometryKind::MultiPolygon);
        let bounds = decoded.bounding_rect().expect("non-empty polygon");
        assert_eq!(bounds.min(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(bounds.max(), Coord { x: 4.0, y: 4.0 });
    }

    #[rstest]
    fn multi_line_is_kept() {
        let lines = MultiLineString::new(vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)],
            line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 7.0)],
        ]);
        let decoded = decode_geometry(&wkb(lines)).expect("valid WKB");
        assert_eq!(decoded.kind(), GeometryKind::MultiLineString);
        assert_eq!(decoded.part_count(), 2);
    }

    #[rstest]
    #[case::short_header(&[0x01, 0x02])]
    #[case::huge_point_count(&[1, 2, 0, 0, 0, 0xff, 0xff, 0xff, 0x7f])]
    #[case::huge_ring_count(&[0, 0, 0, 0, 3, 0x7f, 0xff, 0xff, 0xff])]
    #[case::huge_part_count(&[1, 6, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, 1])]
    #[case::short_point(&[1, 1, 0, 0, 0, 0, 0, 0, 0])]
    #[case::unknown_type(&[1, 99, 0, 0, 0])]
    fn oversized_headers_are_rejected(#[case] bytes: &[u8]) {
        let err = decode_geometry(bytes).expect_err("malformed WKB");
        assert!(matches!(err, GeometryError::Malformed { .. }), "{err}");
    }

    #[rstest]
    fn nested_parts_are_checked() {
        let mut bytes = wkb(MultiLineString::new(vec![line_string![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0)
        ]]));
        bytes.truncate(bytes.len() - 8);
        let err = decode_geometry(&bytes).expect_err("last coordinate missing");
        assert!(matches!(err, GeometryError::Malformed { .. }), "{err}");
    }

    #[rstest]
    fn collections_are_unsupported() {
        let collection = Geometry::GeometryCollection(geo::GeometryCollection::new_from(vec![
            Geometry::Point(Point::new(0.0, 0.0)),
        ]));
        let err = MultiGeometry::from_geometry(collection).expect_err("collections rejected");
        assert!(matches!(err, GeometryError::Unsupported { .. }));
    }

    #[rstest]
    fn transform_moves_every_coordinate() {
        let mut geometry = MultiGeometry::from_geometry(Geometry::Point(point!(x: 1.0, y: 1.0)))
            .expect("point is supported");
        geometry.transform(&AffineTransform::new(2.0, 0.0, 10.0, 0.0, -2.0, 5.0));
        let bounds = geometry.bounding_rect().expect("non-empty");
        assert_eq!(bounds.min(), Coord { x: 12.0, y: 3.0 });
    }
}
