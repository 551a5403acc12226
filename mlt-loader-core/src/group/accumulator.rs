//! Bucket arena shared by the single-tile and merged groupings.
//!
//! Buckets live in a vector in first-seen order and a hash index maps each
//! key to its slot, so features are appended in one pass without
//! materialising a tile's features twice.
use std::collections::HashMap;
use std::iter;

use log::warn;

use super::{BucketKey, GroupingIssue, PlacedFeature, TileLayers};
use crate::address::compute_transform;

#[derive(Debug, Default)]
pub(super) struct BucketAccumulator {
    slots: Vec<(BucketKey, Vec<PlacedFeature>)>,
    index: HashMap<BucketKey, usize>,
    issues: Vec<GroupingIssue>,
}

impl BucketAccumulator {
    pub(super) fn for_tile(tile: TileLayers) -> Self {
        let mut accumulator = Self::default();
        accumulator.ingest_tile(tile);
        accumulator
    }

    pub(super) fn ingest_tile(&mut self, tile: TileLayers) {
        let TileLayers {
            label,
            address,
            layers,
        } = tile;
        for layer in layers {
            let placement = address
                .as_ref()
                .map(|tile_address| compute_transform(tile_address, layer.extent));
            for feature in layer.features {
                match feature.geometry_kind() {
                    Ok(kind) => self.push(
                        BucketKey::new(&layer.name, kind),
                        PlacedFeature { feature, placement },
                    ),
                    Err(source) => {
                        warn!(
                            "dropping feature of tile '{label}' layer '{}': {source}",
                            layer.name
                        );
                        self.issues.push(GroupingIssue::UnknownGeometryKind {
                            tile: label.clone(),
                            layer: layer.name.clone(),
                            source,
                        });
                    }
                }
            }
        }
    }

    fn push(&mut self, key: BucketKey, feature: PlacedFeature) {
        self.append(key, iter::once(feature));
    }

    fn append<I>(&mut self, key: BucketKey, features: I)
    where
        I: IntoIterator<Item = PlacedFeature>,
    {
        let slot = self.index.get(&key).copied().unwrap_or_else(|| {
            let fresh = self.slots.len();
            self.index.insert(key.clone(), fresh);
            self.slots.push((key, Vec::new()));
            fresh
        });
        if let Some((_, bucket)) = self.slots.get_mut(slot) {
            bucket.extend(features);
        }
    }

    /// Fold `other` into `self`, keeping `self`'s buckets first.
    pub(super) fn combine(mut self, other: Self) -> Self {
        for (key, features) in other.slots {
            self.append(key, features);
        }
        self.issues.extend(other.issues);
        self
    }

    pub(super) fn into_parts(self) -> (Vec<(BucketKey, Vec<PlacedFeature>)>, Vec<GroupingIssue>) {
        (self.slots, self.issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodedLayer, RawFeature};
    use crate::geometry::GeometryKind;
    use crate::test_support::point_feature;
    use rstest::rstest;

    fn tile(label: &str, layers: Vec<DecodedLayer>) -> TileLayers {
        TileLayers::new(label, None, layers)
    }

    #[rstest]
    fn same_key_shares_a_slot() {
        let accumulator = BucketAccumulator::for_tile(tile(
            "a",
            vec![
                DecodedLayer::new("pois", vec![point_feature(1.0, 1.0)]),
                DecodedLayer::new("pois", vec![point_feature(2.0, 2.0)]),
            ],
        ));
        let (slots, issues) = accumulator.into_parts();
        assert!(issues.is_empty());
        assert_eq!(slots.len(), 1);
        assert_eq!(slots.first().map(|(_, f)| f.len()), Some(2));
    }

    #[rstest]
    fn combine_appends_into_existing_buckets() {
        let left = BucketAccumulator::for_tile(tile(
            "a",
            vec![DecodedLayer::new("pois", vec![point_feature(1.0, 1.0)])],
        ));
        let right = BucketAccumulator::for_tile(tile(
            "b",
            vec![
                DecodedLayer::new("pois", vec![point_feature(2.0, 2.0)]),
                DecodedLayer::new("labels", vec![point_feature(3.0, 3.0)]),
            ],
        ));
        let (slots, _) = left.combine(right).into_parts();
        let summary: Vec<_> = slots
            .iter()
            .map(|(key, features)| (key.layer.as_str(), key.kind, features.len()))
            .collect();
        assert_eq!(
            summary,
            [
                ("pois", GeometryKind::MultiPoint, 2),
                ("labels", GeometryKind::MultiPoint, 1),
            ]
        );
    }

    #[rstest]
    fn unknown_tags_become_issues() {
        let accumulator = BucketAccumulator::for_tile(tile(
            "a",
            vec![DecodedLayer::new(
                "misc",
                vec![RawFeature::new("Curve", Vec::new())],
            )],
        ));
        let (slots, issues) = accumulator.into_parts();
        assert!(slots.is_empty());
        assert_eq!(issues.len(), 1);
    }
}
