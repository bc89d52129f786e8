use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, Event},
    Writer,
};

use crate::geofile::feature::Feature;

const GENERATOR: &str = concat!("road_conflation ", env!("CARGO_PKG_VERSION"));

/// Added to every modified way.
const VALIDATION_NOTE: &str = "Do not upload this without validation!";

/// Tags that stay in the GeoJSON output but have no place in OSM.
const SKIPPED_KEYS: [&str; 2] = ["track", "note"];

fn write_way<W: Write>(writer: &mut Writer<W>, id: i64, feature: &Feature) -> anyhow::Result<()> {
    let version = feature.tags.version.unwrap_or(1).to_string();
    let id = id.to_string();
    let mut way = BytesStart::new("way");
    way.push_attribute(("action", "modify"));
    way.push_attribute(("id", id.as_str()));
    way.push_attribute(("version", version.as_str()));
    writer.write_event(Event::Start(way))?;

    for node_ref in &feature.refs {
        let node_ref = node_ref.to_string();
        let mut nd = BytesStart::new("nd");
        nd.push_attribute(("ref", node_ref.as_str()));
        writer.write_event(Event::Empty(nd))?;
    }
    let tags = feature
        .tags
        .iter()
        .filter(|(key, _)| !SKIPPED_KEYS.contains(key))
        .chain(std::iter::once(("note", VALIDATION_NOTE)));
    for (key, value) in tags {
        let mut tag = BytesStart::new("tag");
        tag.push_attribute(("k", key));
        tag.push_attribute(("v", value));
        writer.write_event(Event::Empty(tag))?;
    }

    writer.write_event(Event::End(BytesEnd::new("way")))?;
    Ok(())
}

/// Write merged features as modified OSM ways. Only features that came from an OSM way (an id
/// and node references) can be expressed, the rest are skipped. Returns the number of ways
/// written.
pub fn write_osm_ways<W: Write>(features: &[Feature], sink: W) -> anyhow::Result<usize> {
    let mut writer = Writer::new_with_indent(sink, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut osm = BytesStart::new("osm");
    osm.push_attribute(("version", "0.6"));
    osm.push_attribute(("generator", GENERATOR));
    writer.write_event(Event::Start(osm))?;

    let mut written = 0;
    for feature in features {
        match (feature.tags.id, feature.refs.is_empty()) {
            (Some(id), false) => {
                write_way(&mut writer, id, feature)?;
                written += 1;
            }
            _ => log::debug!(
                "Not writing feature without OSM way identity: {:?}",
                feature.tags.name
            ),
        }
    }

    writer.write_event(Event::End(BytesEnd::new("osm")))?;
    writer.into_inner().flush()?;
    Ok(written)
}

pub fn write_features_to_osm_file(
    features: &[Feature],
    output_filepath: &Path,
) -> anyhow::Result<usize> {
    let outfile = File::create(output_filepath)
        .with_context(|| format!("Creating OSM file {:?}", output_filepath))?;
    write_osm_ways(features, BufWriter::new(outfile))
}

#[cfg(test)]
mod tests {
    use testdir::testdir;

    use crate::geofile::{feature::Feature, tags::Tags};

    use super::{write_features_to_osm_file, write_osm_ways};

    fn merged_way() -> Feature {
        let mut feature = Feature::new(
            geo::Geometry::LineString(vec![(-105.0, 40.0), (-105.001, 40.001)].into()),
            Tags::from_pairs([
                ("id", "501"),
                ("version", "3"),
                ("name", "Twin Mtn Rd & Spur"),
                ("highway", "track"),
                ("track", "abc"),
            ]),
        );
        feature.refs = vec![1, 2];
        feature
    }

    #[test]
    fn test_write_osm_ways() {
        let new_road = Feature::new(
            geo::Geometry::LineString(vec![(-105.0, 40.0), (-105.1, 40.1)].into()),
            Tags::from_pairs([("name", "Unmapped Road")]),
        );
        let mut output = Vec::new();
        let written = write_osm_ways(&[merged_way(), new_road], &mut output).unwrap();
        assert_eq!(1, written);

        let xml = String::from_utf8(output).unwrap();
        assert!(xml.contains(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<way action="modify" id="501" version="3">"#));
        assert!(xml.contains(r#"<nd ref="1"/>"#));
        assert!(xml.contains(r#"<nd ref="2"/>"#));
        assert!(xml.contains(r#"<tag k="name" v="Twin Mtn Rd &amp; Spur"/>"#));
        assert!(xml.contains(r#"<tag k="note" v="Do not upload this without validation!"/>"#));
        assert!(!xml.contains("Unmapped Road"));
        assert!(!xml.contains(r#"k="track""#));
        assert!(xml.trim_end().ends_with("</osm>"));
    }

    #[test]
    fn test_write_features_to_osm_file_is_readable() {
        let test_dir = testdir!();
        let filepath = test_dir.join("conflated-out.osm");
        write_features_to_osm_file(&[merged_way()], &filepath).unwrap();

        // The output has no nodes, so the way cannot be resolved into a geometry again, but the
        // document must still parse.
        let features = crate::osm::conversion::read_osm_features_from_file(&filepath).unwrap();
        assert!(features.is_empty());
    }
}
