use std::{fs, path::Path};

use anyhow::Context;
use geojson::{feature::Id, JsonObject, JsonValue};

use super::{feature::Feature, tags::Tags};

pub fn read_features_from_geojson(filepath: &Path) -> anyhow::Result<Vec<Feature>> {
    let contents = fs::read_to_string(filepath)
        .with_context(|| format!("Reading GeoJSON file {:?}", filepath))?;
    parse_features(&contents).with_context(|| format!("Parsing GeoJSON file {:?}", filepath))
}

pub fn parse_features(contents: &str) -> anyhow::Result<Vec<Feature>> {
    let collection: geojson::FeatureCollection = contents.parse()?;
    Ok(collection
        .features
        .into_iter()
        .map(convert_feature)
        .collect())
}

fn convert_feature(feature: geojson::Feature) -> Feature {
    let geometry = feature
        .geometry
        .and_then(|geometry| match geo::Geometry::try_from(geometry) {
            Ok(geometry) => Some(geometry),
            Err(err) => {
                log::warn!("Dropping geometry that cannot be converted: {}", err);
                None
            }
        });

    let mut tags = Tags::new();
    let mut refs = Vec::new();
    if let Some(properties) = feature.properties {
        for (key, value) in properties {
            if key == "refs" {
                refs = parse_refs(&value);
                continue;
            }
            match value {
                JsonValue::String(value) => tags.insert(&key, value),
                JsonValue::Number(value) => tags.insert(&key, value.to_string()),
                JsonValue::Bool(value) => tags.insert(&key, value.to_string()),
                JsonValue::Null => {}
                JsonValue::Array(_) | JsonValue::Object(_) => {
                    log::warn!("Ignoring nested value for property '{}'", key)
                }
            }
        }
    }
    if tags.id.is_none() {
        if let Some(Id::Number(id)) = feature.id {
            tags.id = id.as_i64();
        }
    }

    Feature {
        geometry,
        tags,
        refs,
    }
}

/// Node references are written as a JSON array, but older exports stored them as a string like
/// "[1, 2, 3]".
fn parse_refs(value: &JsonValue) -> Vec<i64> {
    match value {
        JsonValue::Array(items) => items.iter().filter_map(|item| item.as_i64()).collect(),
        JsonValue::String(text) => text
            .trim_matches(|c| c == '[' || c == ']')
            .split(',')
            .filter_map(|item| item.trim().parse().ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn feature_properties(feature: &Feature) -> JsonObject {
    let mut properties = JsonObject::new();
    if let Some(id) = feature.tags.id {
        properties.insert("id".to_string(), JsonValue::from(id));
    }
    if let Some(version) = feature.tags.version {
        properties.insert("version".to_string(), JsonValue::from(version));
    }
    for (key, value) in feature.tags.iter() {
        properties.insert(key.to_string(), JsonValue::from(value));
    }
    if !feature.refs.is_empty() {
        properties.insert("refs".to_string(), JsonValue::from(feature.refs.clone()));
    }
    properties
}

pub fn features_to_geojson(features: &[Feature]) -> geojson::GeoJson {
    let feature_collection: geojson::FeatureCollection = features
        .iter()
        .map(|feature| geojson::Feature {
            bbox: None,
            geometry: feature
                .geometry
                .as_ref()
                .map(|geometry| geojson::Geometry::new(geojson::Value::from(geometry))),
            id: None,
            properties: Some(feature_properties(feature)),
            foreign_members: None,
        })
        .collect();
    geojson::GeoJson::from(feature_collection)
}

pub fn write_features_to_geojson(
    features: &[Feature],
    output_filepath: &Path,
) -> anyhow::Result<()> {
    let geojson_contents = features_to_geojson(features);
    fs::write(output_filepath, geojson_contents.to_string())
        .with_context(|| format!("Writing GeoJSON file {:?}", output_filepath))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use testdir::testdir;

    use crate::geofile::{feature::Feature, tags::Tags};

    use super::{
        parse_features, parse_refs, read_features_from_geojson, write_features_to_geojson,
    };

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[-105.1, 40.1], [-105.2, 40.2]]},
                "properties": {"name": "Twin Mountain Road", "ref:usfs": "FR 123", "lanes": 1, "title": "x"}
            },
            {
                "type": "Feature",
                "id": 77,
                "geometry": null,
                "properties": {"amenity": "toilets", "nested": {"a": 1}}
            }
        ]
    }"#;

    #[test]
    fn test_parse_features() {
        let features = parse_features(COLLECTION).unwrap();
        assert_eq!(2, features.len());

        let road = &features[0];
        assert!(matches!(road.geometry, Some(geo::Geometry::LineString(_))));
        assert_eq!(Some("Twin Mountain Road"), road.tags.name.as_deref());
        assert_eq!(Some("FR 123"), road.tags.usfs_ref.as_deref());
        assert_eq!(Some("1"), road.tags.get("lanes"));
        assert_eq!(Some("x"), road.tags.get("title"));

        let toilets = &features[1];
        assert!(toilets.geometry.is_none());
        assert_eq!(Some(77), toilets.tags.id);
        assert!(!toilets.tags.contains_key("nested"));
    }

    #[rstest]
    #[case(serde_json::json!([1, 2, 3]), vec![1, 2, 3])]
    #[case(serde_json::json!("[4, 5]"), vec![4, 5])]
    #[case(serde_json::json!(null), vec![])]
    fn test_parse_refs(#[case] value: serde_json::Value, #[case] expected: Vec<i64>) {
        assert_eq!(expected, parse_refs(&value));
    }

    #[test]
    fn test_geojson_write_read_round_trip() {
        let mut feature = Feature::new(
            geo::Geometry::LineString(vec![(-105.1, 40.1), (-105.2, 40.2)].into()),
            Tags::from_pairs([
                ("id", "501"),
                ("version", "3"),
                ("name", "Twin Mountain Road"),
                ("debug", "hits: 1"),
            ]),
        );
        feature.refs = vec![10, 11];

        let test_dir = testdir!();
        let filepath = test_dir.join("merged.geojson");
        write_features_to_geojson(&[feature.clone()], &filepath).unwrap();
        let features = read_features_from_geojson(&filepath).unwrap();

        assert_eq!(vec![feature], features);
    }
}
