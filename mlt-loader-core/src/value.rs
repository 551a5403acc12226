//! Scalar attribute values carried by tile features.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `i64::MIN` as a float (inclusive).
const I64_MIN_F: f64 = -9_223_372_036_854_775_808.0;
/// `2^63`, the first float above `i64::MAX`.
const I64_END_F: f64 = 9_223_372_036_854_775_808.0;

/// A property value as produced by the tile decoder.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum PropertyValue {
    /// Explicit absence of a value.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    String(String),
}

/// Kind of a non-null [`PropertyValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueKind {
    /// Boolean values.
    Bool,
    /// Integer values.
    Int,
    /// Floating-point values.
    Float,
    /// Text values.
    String,
}

impl ValueKind {
    /// Lower-case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PropertyValue {
    /// Kind of the value, or `None` for [`PropertyValue::Null`].
    #[must_use]
    pub const fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ValueKind::Bool),
            Self::Int(_) => Some(ValueKind::Int),
            Self::Float(_) => Some(ValueKind::Float),
            Self::String(_) => Some(ValueKind::String),
        }
    }

    /// Whether the value is [`PropertyValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert the value to `kind`.
    ///
    /// Returns `None` when the conversion would lose information or the
    /// value is null.
    ///
    /// # Examples
    /// ```
    /// use mlt_loader_core::{PropertyValue, ValueKind};
    ///
    /// assert_eq!(PropertyValue::Int(4).coerce(ValueKind::Float), Some(PropertyValue::Float(4.0)));
    /// assert_eq!(PropertyValue::Float(4.5).coerce(ValueKind::Int), None);
    /// ```
    #[must_use]
    pub fn coerce(&self, kind: ValueKind) -> Option<Self> {
        match (self, kind) {
            (Self::Null, _) => None,
            (Self::Bool(b), ValueKind::Bool) => Some(Self::Bool(*b)),
            (Self::Int(i), ValueKind::Int) => Some(Self::Int(*i)),
            (Self::Float(f), ValueKind::Float) => Some(Self::Float(*f)),
            (value, ValueKind::String) => Some(Self::String(value.to_string())),
            (Self::Bool(b), ValueKind::Int) => Some(Self::Int(i64::from(*b))),
            (Self::Bool(b), ValueKind::Float) => Some(Self::Float(f64::from(u8::from(*b)))),
            (Self::Int(i), ValueKind::Float) => Some(Self::Float(int_to_float(*i))),
            (Self::Int(i), ValueKind::Bool) => match i {
                0 => Some(Self::Bool(false)),
                1 => Some(Self::Bool(true)),
                _ => None,
            },
            (Self::Float(f), ValueKind::Int) => float_to_int(*f).map(Self::Int),
            (Self::Float(_), ValueKind::Bool) => None,
            (Self::String(s), ValueKind::Bool) => s.trim().parse().ok().map(Self::Bool),
            (Self::String(s), ValueKind::Int) => s.trim().parse().ok().map(Self::Int),
            (Self::String(s), ValueKind::Float) => s.trim().parse().ok().map(Self::Float),
        }
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "integers beyond 2^53 round to the nearest representable float"
)]
const fn int_to_float(value: i64) -> f64 {
    value as f64
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "the value is checked to be integral and within i64 range first"
)]
fn float_to_int(value: f64) -> Option<i64> {
    let integral = value.is_finite() && value.fract() == 0.0;
    (integral && (I64_MIN_F..I64_END_F).contains(&value)).then_some(value as i64)
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for PropertyValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Feature attributes in the order the decoder produced them.
///
/// Names are unique; inserting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Properties(Vec<(String, PropertyValue)>);

impl Properties {
    /// Create an empty attribute list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Look up a value by attribute name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0
            .iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }

    /// Set `name` to `value`, returning the previous value if any.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        let key = name.into();
        let new_value = value.into();
        if let Some((_, slot)) = self.0.iter_mut().find(|(existing, _)| *existing == key) {
            return Some(std::mem::replace(slot, new_value));
        }
        self.0.push((key, new_value));
        None
    }

    /// Iterate over `(name, value)` pairs in decoder order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of attributes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no attributes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Properties
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::new();
        for (name, value) in iter {
            properties.insert(name, value);
        }
        properties
    }
}
