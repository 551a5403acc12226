//! Materialise a bucket into a typed, geometry-homogeneous collection.

use std::collections::BTreeMap;
use std::fmt;

use geo::{Coord, Rect};
use log::{debug, info, warn};
use thiserror::Error;

use crate::geometry::{GeometryError, GeometryKind, MultiGeometry, decode_geometry};
use crate::group::PlacedFeature;
use crate::schema::Schema;
use crate::value::PropertyValue;

/// Coordinate reference of a collection whose features were all placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Crs {
    /// Spherical Web Mercator metres.
    #[cfg_attr(feature = "serde", serde(rename = "EPSG:3857"))]
    WebMercator,
}

impl Crs {
    /// Authority code, e.g. `"EPSG:3857"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebMercator => "EPSG:3857",
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feature of an [`OutputCollection`].
#[derive(Debug, Clone, PartialEq)]
pub struct TypedFeature {
    /// Identifier carried over from the decoder.
    pub id: Option<u64>,
    /// Multi-part geometry, placed if the source tile had an address.
    pub geometry: MultiGeometry,
    /// Attributes restricted to the schema; missing, null, or
    /// non-coercible values are absent.
    pub attributes: BTreeMap<String, PropertyValue>,
}

/// One named collection built from a bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputCollection {
    /// Display name, e.g. `"t1 — buildings"`.
    pub name: String,
    /// Canonical geometry kind shared by every feature.
    pub kind: GeometryKind,
    /// Sorted attribute schema.
    pub schema: Schema,
    /// Features in bucket order.
    pub features: Vec<TypedFeature>,
    /// Union of the feature bounds.
    pub extent: Option<Rect<f64>>,
    /// Set only when every feature was placed.
    pub crs: Option<Crs>,
}

impl OutputCollection {
    /// Number of features.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection holds no features.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A feature the builder could not convert.
#[derive(Debug, Error)]
#[error("feature {index} of '{collection}' dropped: {source}")]
pub struct DroppedFeature {
    /// Name of the collection being built.
    pub collection: String,
    /// Position of the feature within its bucket.
    pub index: usize,
    /// Geometry failure.
    #[source]
    pub source: GeometryError,
}

/// A built collection and the features left out of it.
#[derive(Debug)]
pub struct BuiltCollection {
    /// The collection.
    pub collection: OutputCollection,
    /// Features whose geometry could not be converted.
    pub dropped: Vec<DroppedFeature>,
}

/// Errors that abort building one collection.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The requested kind is a single-part kind.
    #[error("cannot build '{name}': {kind} is not a multi-part geometry kind")]
    NotCanonical {
        /// Collection name.
        name: String,
        /// The rejected kind.
        kind: GeometryKind,
    },
    /// No feature survived geometry conversion.
    #[error("cannot build '{name}': all {} features were dropped", dropped.len())]
    Empty {
        /// Collection name.
        name: String,
        /// Why each feature was dropped.
        dropped: Vec<DroppedFeature>,
    },
}

/// Build a collection from a bucket's features.
///
/// Each feature's geometry is decoded, upgraded to multi-part, checked
/// against `kind`, and moved by its tile placement. Attributes are filled
/// sparsely from `schema`, coercing values to the field kind. `crs` is kept
/// only when every surviving feature was placed.
///
/// # Errors
/// Returns [`CollectionError::NotCanonical`] for single-part kinds and
/// [`CollectionError::Empty`] when every feature was dropped.
pub fn build(
    name: &str,
    kind: GeometryKind,
    features: Vec<PlacedFeature>,
    schema: &Schema,
    crs: Option<Crs>,
) -> Result<BuiltCollection, CollectionError> {
    if !kind.is_multi() {
        return Err(CollectionError::NotCanonical {
            name: name.to_owned(),
            kind,
        });
    }

    let mut typed = Vec::with_capacity(features.len());
    let mut dropped = Vec::new();
    let mut extent = None;
    let mut all_placed = true;

    for (index, placed) in features.into_iter().enumerate() {
        let geometry = match place_geometry(&placed, kind) {
            Ok(geometry) => geometry,
            Err(source) => {
                warn!("dropping feature {index} of '{name}': {source}");
                dropped.push(DroppedFeature {
                    collection: name.to_owned(),
                    index,
                    source,
                });
                continue;
            }
        };
        all_placed &= placed.placement.is_some();
        if let Some(bounds) = geometry.bounding_rect() {
            extent = Some(include_bounds(extent, bounds));
        }
        typed.push(TypedFeature {
            id: placed.feature.id,
            geometry,
            attributes: fill_attributes(name, &placed, schema),
        });
    }

    if typed.is_empty() {
        return Err(CollectionError::Empty {
            name: name.to_owned(),
            dropped,
        });
    }

    info!("Loaded layer '{name}' with {} features", typed.len());
    Ok(BuiltCollection {
        collection: OutputCollection {
            name: name.to_owned(),
            kind,
            schema: schema.clone(),
            features: typed,
            extent,
            crs: crs.filter(|_| all_placed),
        },
        dropped,
    })
}

fn place_geometry(
    placed: &PlacedFeature,
    kind: GeometryKind,
) -> Result<MultiGeometry, GeometryError> {
    let mut geometry = decode_geometry(&placed.feature.geometry)?;
    if geometry.kind() != kind {
        return Err(GeometryError::KindMismatch {
            expected: kind,
            found: geometry.kind(),
        });
    }
    if let Some(transform) = &placed.placement {
        geometry.transform(transform);
    }
    Ok(geometry)
}

fn fill_attributes(
    collection: &str,
    placed: &PlacedFeature,
    schema: &Schema,
) -> BTreeMap<String, PropertyValue> {
    let mut attributes = BTreeMap::new();
    for field in schema.fields() {
        let Some(value) = placed.feature.properties.get(&field.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        match value.coerce(field.kind) {
            Some(coerced) => {
                attributes.insert(field.name.clone(), coerced);
            }
            None => debug!(
                "'{collection}': value {value} of '{}' is not a {}",
                field.name, field.kind
            ),
        }
    }
    attributes
}

fn include_bounds(existing: Option<Rect<f64>>, bounds: Rect<f64>) -> Rect<f64> {
    match existing {
        Some(current) => Rect::new(
            Coord {
                x: current.min().x.min(bounds.min().x),
                y: current.min().y.min(bounds.min().y),
            },
            Coord {
                x: current.max().x.max(bounds.max().x),
                y: current.max().y.max(bounds.max().y),
            },
        ),
        None => bounds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{DEFAULT_EXTENT, TileAddress, TileScheme, compute_transform};
    use crate::decode::RawFeature;
    use crate::schema::discover;
    use crate::test_support::{line_feature, point_feature, polygon_feature};
    use crate::value::ValueKind;
    use rstest::rstest;

    fn unplaced(feature: RawFeature) -> PlacedFeature {
        PlacedFeature {
            feature,
            placement: None,
        }
    }

    fn schema_of(features: &[PlacedFeature]) -> Schema {
        discover(features.iter().map(|placed| &placed.feature))
    }

    #[rstest]
    fn extent_is_union_of_feature_bounds() {
        let features = vec![
            unplaced(polygon_feature(0.0, 0.0, 10.0)),
            unplaced(polygon_feature(30.0, -5.0, 5.0)),
        ];
        let schema = schema_of(&features);
        let built = build("t1 \u{2014} water", GeometryKind::MultiPolygon, features, &schema, None)
            .expect("collection builds");
        let union = built
            .collection
            .features
            .iter()
            .filter_map(|feature| feature.geometry.bounding_rect())
            .fold(None, |acc, rect| Some(include_bounds(acc, rect)));
        assert_eq!(built.collection.extent, union);
        assert_eq!(
            built.collection.extent,
            Some(Rect::new(
                Coord { x: 0.0, y: -5.0 },
                Coord { x: 35.0, y: 10.0 }
            ))
        );
    }

    #[rstest]
    fn attributes_are_sparse_and_coerced() {
        let features = vec![
            unplaced(point_feature(0.0, 0.0).with_property("height", 3.5)),
            unplaced(
                point_feature(1.0, 1.0)
                    .with_property("height", PropertyValue::Null)
                    .with_property("name", "x"),
            ),
            unplaced(
                point_feature(2.0, 2.0)
                    .with_property("name", "y")
                    .with_property("height", 4_i64),
            ),
            unplaced(point_feature(3.0, 3.0).with_property("height", "tall")),
        ];
        let schema = schema_of(&features);
        assert_eq!(schema.kind_of("height"), Some(ValueKind::Float));
        let built = build("pois", GeometryKind::MultiPoint, features, &schema, None)
            .expect("collection builds");
        let heights: Vec<_> = built
            .collection
            .features
            .iter()
            .map(|feature| feature.attributes.get("height").cloned())
            .collect();
        assert_eq!(
            heights,
            [
                Some(PropertyValue::Float(3.5)),
                None,
                Some(PropertyValue::Float(4.0)),
                None,
            ]
        );
        let first = built.collection.features.first().expect("four features");
        assert!(!first.attributes.contains_key("name"));
    }

    #[rstest]
    fn single_part_kind_is_rejected() {
        let err = build(
            "pois",
            GeometryKind::Point,
            vec![unplaced(point_feature(0.0, 0.0))],
            &Schema::default(),
            None,
        )
        .expect_err("single-part kind");
        assert!(matches!(err, CollectionError::NotCanonical { .. }));
    }

    #[rstest]
    fn mismatched_and_corrupt_features_are_dropped() {
        let features = vec![
            unplaced(line_feature(&[(0.0, 0.0), (1.0, 1.0)])),
            unplaced(point_feature(0.0, 0.0)),
            unplaced(RawFeature::new("LineString", vec![0xff])),
            unplaced(RawFeature::new(
                "LineString",
                vec![1, 2, 0, 0, 0, 0xff, 0xff, 0xff, 0x7f],
            )),
        ];
        let built = build(
            "roads",
            GeometryKind::MultiLineString,
            features,
            &Schema::default(),
            None,
        )
        .expect("one feature survives");
        assert_eq!(built.collection.len(), 1);
        let indices: Vec<_> = built.dropped.iter().map(|d| d.index).collect();
        assert_eq!(indices, [1, 2, 3]);
        assert!(matches!(
            built.dropped.first().map(|d| &d.source),
            Some(GeometryError::KindMismatch { .. })
        ));
    }

    #[rstest]
    fn all_dropped_is_an_error() {
        let err = build(
            "roads",
            GeometryKind::MultiLineString,
            vec![unplaced(RawFeature::new("LineString", Vec::new()))],
            &Schema::default(),
            None,
        )
        .expect_err("nothing to build");
        assert!(matches!(err, CollectionError::Empty { ref dropped, .. } if dropped.len() == 1));
    }

    #[rstest]
    #[case(true, Some(Crs::WebMercator))]
    #[case(false, None)]
    fn crs_requires_every_feature_placed(#[case] place_all: bool, #[case] expected: Option<Crs>) {
        let address = TileAddress::new(2, 1, 1, TileScheme::Tms).expect("valid address");
        let transform = compute_transform(&address, DEFAULT_EXTENT);
        let features = vec![
            PlacedFeature {
                feature: point_feature(0.0, 0.0),
                placement: Some(transform),
            },
            PlacedFeature {
                feature: point_feature(4096.0, 4096.0),
                placement: place_all.then_some(transform),
            },
        ];
        let built = build(
            "pois",
            GeometryKind::MultiPoint,
            features,
            &Schema::default(),
            Some(Crs::WebMercator),
        )
        .expect("collection builds");
        assert_eq!(built.collection.crs, expected);
    }

    #[rstest]
    fn placement_moves_geometry_into_mercator() {
        let address = TileAddress::new(0, 0, 0, TileScheme::Xyz).expect("valid address");
        let features = vec![PlacedFeature {
            feature: point_feature(0.0, 0.0),
            placement: Some(compute_transform(&address, DEFAULT_EXTENT)),
        }];
        let built = build(
            "pois",
            GeometryKind::MultiPoint,
            features,
            &Schema::default(),
            Some(Crs::WebMercator),
        )
        .expect("collection builds");
        let extent = built.collection.extent.expect("non-empty");
        assert!(extent.min().x < -20_000_000.0);
        assert!(extent.min().y > 20_000_000.0);
    }
}
