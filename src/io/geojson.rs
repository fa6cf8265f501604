//! GeoJSON FeatureCollection read/write.
//!
//! Geometry is never parsed: it is held as a raw JSON fragment and written
//! back exactly as it was read. Properties are kept as an ordered JSON map.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    /// Every other top-level member (`name`, `crs`, `bbox`, foreign members).
    #[serde(flatten)]
    pub members: Map<String, Value>,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    /// `id`, `bbox` and any foreign members, in input order.
    #[serde(flatten)]
    pub members: Map<String, Value>,
    /// Opaque geometry payload (`null` allowed).
    pub geometry: Option<Box<RawValue>>,
    pub properties: Option<Map<String, Value>>,
}

// Hand-written: `RawValue` cannot be read from the buffered content a derived
// impl with a flattened map goes through.
impl<'de> Deserialize<'de> for Feature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FeatureVisitor;

        impl<'de> Visitor<'de> for FeatureVisitor {
            type Value = Feature;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a GeoJSON Feature object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Feature, A::Error> {
                let mut kind = None;
                let mut geometry = None;
                let mut properties = None;
                let mut members = Map::new();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "type" => kind = Some(map.next_value::<String>()?),
                        "geometry" => geometry = map.next_value::<Option<Box<RawValue>>>()?,
                        "properties" => properties = map.next_value::<Option<Map<String, Value>>>()?,
                        _ => {
                            let value = map.next_value::<Value>()?;
                            members.insert(key, value);
                        }
                    }
                }
                Ok(Feature {
                    kind: kind.ok_or_else(|| <A::Error as de::Error>::missing_field("type"))?,
                    members,
                    geometry,
                    properties,
                })
            }
        }

        deserializer.deserialize_map(FeatureVisitor)
    }
}

impl<'de> Deserialize<'de> for FeatureCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CollectionVisitor;

        impl<'de> Visitor<'de> for CollectionVisitor {
            type Value = FeatureCollection;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a GeoJSON FeatureCollection object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FeatureCollection, A::Error> {
                let mut kind = None;
                let mut features = None;
                let mut members = Map::new();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "type" => kind = Some(map.next_value::<String>()?),
                        "features" => features = Some(map.next_value::<Vec<Feature>>()?),
                        _ => {
                            let value = map.next_value::<Value>()?;
                            members.insert(key, value);
                        }
                    }
                }
                Ok(FeatureCollection {
                    kind: kind.ok_or_else(|| <A::Error as de::Error>::missing_field("type"))?,
                    members,
                    features: features.ok_or_else(|| <A::Error as de::Error>::missing_field("features"))?,
                })
            }
        }

        deserializer.deserialize_map(CollectionVisitor)
    }
}

impl Feature {
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|p| p.get(key))
    }
}

impl FeatureCollection {
    /// Union of property keys across features, in first-seen order.
    pub fn property_columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for feature in &self.features {
            let Some(props) = &feature.properties else { continue };
            for key in props.keys() {
                if seen.insert(key.clone()) {
                    out.push(key.clone());
                }
            }
        }
        out
    }
}

/// Parse a FeatureCollection from text.
pub fn parse_feature_collection(text: &str) -> Result<FeatureCollection, AppError> {
    let collection: FeatureCollection = serde_json::from_str(text)
        .map_err(|e| AppError::new(AppError::INPUT, format!("Invalid GeoJSON: {e}")))?;
    if collection.kind != "FeatureCollection" {
        return Err(AppError::new(
            AppError::INPUT,
            format!("Expected a GeoJSON FeatureCollection, found type '{}'.", collection.kind),
        ));
    }
    Ok(collection)
}

/// Read the primary dataset. Absence or a parse failure is fatal.
pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection, AppError> {
    if !path.exists() {
        return Err(AppError::new(
            AppError::INPUT,
            format!("Input file not found: '{}'", path.display()),
        ));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::new(AppError::INPUT, format!("Failed to read '{}': {e}", path.display())))?;
    parse_feature_collection(&text)
        .map_err(|e| AppError::new(e.exit_code(), format!("{} ('{}')", e, path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_round_trips_verbatim() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[-97.7431,  30.2672]},"properties":{"geoid":"48453001832"}},
            {"type":"Feature","geometry":null,"properties":null}
        ]}"#;
        let fc = parse_feature_collection(text).unwrap();
        assert_eq!(
            fc.features[0].geometry.as_ref().unwrap().get(),
            r#"{"type":"Point","coordinates":[-97.7431,  30.2672]}"#
        );
        assert!(fc.features[1].geometry.is_none());

        let out = serde_json::to_string(&fc.features[0]).unwrap();
        assert!(out.contains(r#""geometry":{"type":"Point","coordinates":[-97.7431,  30.2672]}"#));
    }

    #[test]
    fn foreign_members_survive_a_round_trip() {
        let text = r#"{"type":"FeatureCollection","name":"udp_austin","crs":{"type":"name","properties":{"name":"EPSG:4326"}},"source":"udp","features":[
            {"type":"Feature","id":7,"bbox":[0,0,1,1],"tippecanoe":{"minzoom":9},"geometry":{"type":"Point","coordinates":[1.50,2]},"properties":{"geoid":"1"}}
        ]}"#;
        let fc = parse_feature_collection(text).unwrap();
        assert_eq!(fc.members["name"], "udp_austin");
        assert_eq!(fc.members["source"], "udp");
        assert_eq!(fc.features[0].members["id"], 7);
        assert_eq!(fc.features[0].members["tippecanoe"]["minzoom"], 9);

        let out = serde_json::to_string(&fc).unwrap();
        assert!(out.starts_with(r#"{"type":"FeatureCollection","name":"udp_austin","crs":"#));
        assert!(out.contains(r#""source":"udp""#));
        assert!(out.contains(
            r#"{"type":"Feature","id":7,"bbox":[0,0,1,1],"tippecanoe":{"minzoom":9},"geometry":{"type":"Point","coordinates":[1.50,2]},"properties":{"geoid":"1"}}"#
        ));
    }

    #[test]
    fn feature_without_geometry_key_reads_as_null() {
        let fc = parse_feature_collection(
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{}}]}"#,
        )
        .unwrap();
        assert!(fc.features[0].geometry.is_none());
        assert!(parse_feature_collection(r#"{"type":"FeatureCollection"}"#).is_err());
    }

    #[test]
    fn property_columns_are_a_union_in_first_seen_order() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":null,"properties":{"b":1,"a":2}},
            {"type":"Feature","geometry":null,"properties":{"a":3,"c":4}}
        ]}"#;
        let fc = parse_feature_collection(text).unwrap();
        assert_eq!(fc.property_columns(), vec!["b", "a", "c"]);
    }

    #[test]
    fn rejects_non_collections_and_missing_files() {
        let err = parse_feature_collection(r#"{"type":"Feature","features":[]}"#).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = read_feature_collection(Path::new("/definitely/not/here.geojson")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
