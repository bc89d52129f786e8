use super::tags::Tags;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feature {
    /// Geometry in WGS84 lon/lat. Tag-only features have none.
    pub geometry: Option<geo::Geometry>,
    pub tags: Tags,
    /// Node references of an OSM way, in way order.
    pub refs: Vec<i64>,
}

impl From<geo::Geometry> for Feature {
    fn from(value: geo::Geometry) -> Self {
        Self {
            geometry: Some(value),
            tags: Tags::default(),
            refs: Vec::new(),
        }
    }
}

impl Feature {
    pub fn new(geometry: geo::Geometry, tags: Tags) -> Self {
        Self {
            geometry: Some(geometry),
            tags,
            refs: Vec::new(),
        }
    }

    /// Whether the feature can take part in conflation. Only line and area features are matched;
    /// points, missing geometries and lines without at least two coordinates are not.
    pub fn is_conflatable(&self) -> bool {
        match &self.geometry {
            Some(geo::Geometry::LineString(line)) => line.0.len() > 1,
            Some(geo::Geometry::MultiLineString(lines)) => {
                lines.0.iter().any(|line| line.0.len() > 1)
            }
            Some(geo::Geometry::Polygon(polygon)) => polygon.exterior().0.len() > 1,
            _ => false,
        }
    }
}
