//! Attribute schema discovery over a bucket of features.
//!
//! The first non-null value seen for an attribute fixes that attribute's
//! kind for the whole bucket; an attribute that is null everywhere is typed
//! as text. Fields are reported sorted by name so output does not depend on
//! feature order.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::decode::RawFeature;
use crate::value::{Properties, ValueKind};

/// A named, typed attribute of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Field {
    /// Attribute name.
    pub name: String,
    /// Kind fixed by the first non-null value observed.
    pub kind: ValueKind,
}

/// Ordered, duplicate-free list of [`Field`]s, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(transparent))]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Discover a schema from a sequence of attribute lists.
    ///
    /// Attributes that are null everywhere are typed [`ValueKind::String`].
    #[must_use]
    pub fn from_properties<'a, I>(properties: I) -> Self
    where
        I: IntoIterator<Item = &'a Properties>,
    {
        let mut seen: BTreeMap<&str, Option<ValueKind>> = BTreeMap::new();
        for attrs in properties {
            for (name, value) in attrs.iter() {
                let slot = seen.entry(name).or_insert(None);
                if slot.is_none() {
                    *slot = value.kind();
                }
            }
        }
        let fields = seen
            .into_iter()
            .map(|(name, kind)| Field {
                name: name.to_owned(),
                kind: kind.unwrap_or(ValueKind::String),
            })
            .collect();
        Self { fields }
    }

    /// Fields in name order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Kind of the named field, if present.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.fields
            .binary_search_by(|field| field.name.as_str().cmp(name))
            .ok()
            .and_then(|index| self.fields.get(index))
            .map(|field| field.kind)
    }

    /// Number of fields.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Discover the schema of a bucket's features.
///
/// # Examples
/// ```
/// use mlt_loader_core::{RawFeature, ValueKind, discover};
///
/// let tall = RawFeature::new("Point", Vec::new()).with_property("height", 3.5);
/// let named = RawFeature::new("Point", Vec::new()).with_property("name", "x");
/// let schema = discover([&tall, &named]);
/// let kinds: Vec<_> = schema.fields().iter().map(|f| (f.name.as_str(), f.kind)).collect();
/// assert_eq!(kinds, [("height", ValueKind::Float), ("name", ValueKind::String)]);
/// ```
#[must_use]
pub fn discover<'a, I>(features: I) -> Schema
where
    I: IntoIterator<Item = &'a RawFeature>,
{
    Schema::from_properties(features.into_iter().map(|feature| &feature.properties))
}
