pub mod feature;
pub mod geojson;
pub mod tags;

use std::path::Path;

use anyhow::anyhow;

use self::feature::Feature;

/// Read a feature file, picking the reader from the file extension.
pub fn read_features(filepath: &Path) -> anyhow::Result<Vec<Feature>> {
    match filepath
        .extension()
        .and_then(|extension| extension.to_str())
    {
        Some("geojson") => {
            log::debug!("Parsing GeoJSON file {:?}", filepath);
            self::geojson::read_features_from_geojson(filepath)
        }
        Some("osm") => {
            log::debug!("Parsing OSM XML file {:?}", filepath);
            crate::osm::conversion::read_osm_features_from_file(filepath)
        }
        _ => Err(anyhow!(
            "Unsupported input format for {:?}, expected .geojson or .osm",
            filepath
        )),
    }
}
