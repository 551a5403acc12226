//! A [`TileDecoder`] for JSON tile dumps.
//!
//! The dump mirrors what an MLT decoder yields per tile:
//!
//! ```json
//! {"layers": [{"name": "roads", "extent": 4096, "features": [
//!     {"id": 7, "geometry_type": "LineString", "wkb": "AQIAAAA...",
//!      "properties": {"class": "primary", "lanes": 2}}
//! ]}]}
//! ```
//!
//! `wkb` is standard Base64. Property order is preserved. Nested arrays and
//! objects are not scalar attributes and decode as null.

use std::fmt;

use base64::{Engine as _, engine::general_purpose};
use log::warn;
use mlt_loader_core::{
    DEFAULT_EXTENT, DecodeError, DecodedLayer, Properties, PropertyValue, RawFeature, TileDecoder,
};
use serde::Deserialize;
use serde::de::{MapAccess, Visitor};
use serde_json::Value;

/// Decodes tile dumps in the JSON layout described in the module docs.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTileDecoder;

#[derive(Debug, Deserialize)]
struct TileDump {
    #[serde(default)]
    layers: Vec<LayerDump>,
}

#[derive(Debug, Deserialize)]
struct LayerDump {
    name: String,
    #[serde(default = "default_extent")]
    extent: u32,
    #[serde(default)]
    features: Vec<FeatureDump>,
}

const fn default_extent() -> u32 {
    DEFAULT_EXTENT
}

#[derive(Debug, Deserialize)]
struct FeatureDump {
    #[serde(default)]
    id: Option<u64>,
    geometry_type: String,
    wkb: String,
    #[serde(default)]
    properties: OrderedProperties,
}

/// JSON object kept in document order.
#[derive(Debug, Default)]
struct OrderedProperties(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for OrderedProperties {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OrderedProperties;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of feature properties")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or_default());
                while let Some(entry) = map.next_entry::<String, Value>()? {
                    entries.push(entry);
                }
                Ok(OrderedProperties(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

impl TileDecoder for JsonTileDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedLayer>, DecodeError> {
        let dump: TileDump =
            serde_json::from_slice(bytes).map_err(|err| DecodeError::Decoder(Box::new(err)))?;
        dump.layers.into_iter().map(decode_layer).collect()
    }
}

fn decode_layer(layer: LayerDump) -> Result<DecodedLayer, DecodeError> {
    let LayerDump {
        name,
        extent,
        features: dumped,
    } = layer;
    let features = dumped
        .into_iter()
        .enumerate()
        .map(|(index, feature)| decode_feature(&name, index, feature))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DecodedLayer::new(name, features).with_extent(extent))
}

fn decode_feature(
    layer: &str,
    index: usize,
    feature: FeatureDump,
) -> Result<RawFeature, DecodeError> {
    let geometry = general_purpose::STANDARD
        .decode(feature.wkb.as_bytes())
        .map_err(|err| DecodeError::Corrupt {
            reason: format!("feature {index} of layer '{layer}' has invalid WKB Base64: {err}"),
        })?;
    let properties = feature
        .properties
        .0
        .into_iter()
        .map(|(name, value)| {
            let scalar = scalar_value(layer, &name, value);
            (name, scalar)
        })
        .collect::<Properties>();
    Ok(RawFeature {
        id: feature.id,
        geometry_type: feature.geometry_type,
        geometry,
        properties,
    })
}

#[expect(
    clippy::cast_precision_loss,
    reason = "integers beyond i64 are carried as the nearest float"
)]
fn scalar_value(layer: &str, name: &str, value: Value) -> PropertyValue {
    match value {
        Value::Null => PropertyValue::Null,
        Value::Bool(flag) => PropertyValue::Bool(flag),
        Value::Number(number) => number.as_i64().map_or_else(
            || {
                number
                    .as_u64()
                    .map(|big| big as f64)
                    .or_else(|| number.as_f64())
                    .map_or(PropertyValue::Null, PropertyValue::Float)
            },
            PropertyValue::Int,
        ),
        Value::String(text) => PropertyValue::String(text),
        Value::Array(_) | Value::Object(_) => {
            warn!("layer '{layer}': property '{name}' is not a scalar; reading it as null");
            PropertyValue::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;
    use mlt_loader_core::test_support::wkb;
    use rstest::rstest;

    fn encode(bytes: &[u8]) -> String {
        general_purpose::STANDARD.encode(bytes)
    }

    #[rstest]
    fn decodes_layers_and_scalars() {
        let point = encode(&wkb(point!(x: 10.0, y: 20.0)));
        let dump = format!(
            r#"{{"layers":[{{"name":"pois","extent":512,"features":[
                {{"id":3,"geometry_type":"Point","wkb":"{point}",
                  "properties":{{"z":1,"a":2.5,"m":"x","flag":true,"gone":null,"big":18446744073709551615}}}}
            ]}}]}}"#
        );
        let layers = JsonTileDecoder.decode(dump.as_bytes()).expect("valid dump");
        let layer = layers.first().expect("one layer");
        assert_eq!(layer.name, "pois");
        assert_eq!(layer.extent, 512);
        let feature = layer.features.first().expect("one feature");
        assert_eq!(feature.id, Some(3));
        let names: Vec<&str> = feature.properties.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["z", "a", "m", "flag", "gone", "big"]);
        assert_eq!(feature.properties.get("z"), Some(&PropertyValue::Int(1)));
        assert_eq!(feature.properties.get("a"), Some(&PropertyValue::Float(2.5)));
        assert_eq!(feature.properties.get("gone"), Some(&PropertyValue::Null));
        assert!(matches!(
            feature.properties.get("big"),
            Some(PropertyValue::Float(_))
        ));
    }

    #[rstest]
    fn extent_defaults_to_4096() {
        let layers = JsonTileDecoder
            .decode(br#"{"layers":[{"name":"empty"}]}"#)
            .expect("valid dump");
        assert_eq!(layers.first().map(|l| l.extent), Some(4096));
    }

    #[rstest]
    fn nested_values_become_null() {
        let dump = r#"{"layers":[{"name":"l","features":[
            {"geometry_type":"Point","wkb":"","properties":{"tags":["a"],"meta":{"k":1}}}
        ]}]}"#;
        let layers = JsonTileDecoder.decode(dump.as_bytes()).expect("valid dump");
        let feature = layers
            .first()
            .and_then(|layer| layer.features.first())
            .expect("one feature");
        assert_eq!(feature.properties.get("tags"), Some(&PropertyValue::Null));
        assert_eq!(feature.properties.get("meta"), Some(&PropertyValue::Null));
    }

    #[rstest]
    #[case(b"not json".as_slice())]
    #[case(br#"{"layers":[{"features":[]}]}"#.as_slice())]
    fn malformed_json_is_a_decoder_error(#[case] input: &[u8]) {
        let err = JsonTileDecoder.decode(input).expect_err("invalid dump");
        assert!(matches!(err, DecodeError::Decoder(_)));
    }

    #[rstest]
    fn bad_base64_is_corrupt() {
        let dump = br#"{"layers":[{"name":"l","features":[
            {"geometry_type":"Point","wkb":"***"}
        ]}]}"#;
        let err = JsonTileDecoder.decode(dump).expect_err("invalid base64");
        assert!(matches!(err, DecodeError::Corrupt { reason } if reason.contains("layer 'l'")));
    }
}
