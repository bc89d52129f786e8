use geo::{BoundingRect, CoordsIter, EuclideanLength};
use proj::Transform;

use crate::error::{GeometryError, GeometryResult};

use super::crs_utils::{epsg_code_to_authority_string, geometry_type_name, WEB_MERCATOR, WGS84};

/// A geometry in a planar, meter based CRS. Only planar geometries can be measured, which keeps
/// degree based coordinates out of the distance math.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarGeometry(geo::Geometry);

impl PlanarGeometry {
    /// Wrap a geometry whose coordinates are already in a planar CRS.
    pub fn from_projected(geometry: geo::Geometry) -> Self {
        Self(geometry)
    }

    pub fn geometry(&self) -> &geo::Geometry {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.coords_count() == 0
    }

    /// True for LineString and MultiLineString.
    pub fn is_lineal(&self) -> bool {
        matches!(
            self.0,
            geo::Geometry::LineString(_) | geo::Geometry::MultiLineString(_)
        )
    }

    /// The component lines of a lineal geometry. MultiLineStrings are flattened, every other
    /// geometry type has no lines.
    pub fn lines(&self) -> Vec<&geo::LineString> {
        match &self.0 {
            geo::Geometry::LineString(line) => vec![line],
            geo::Geometry::MultiLineString(lines) => lines.0.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Total length. Polygons measure all of their rings, points have no length.
    pub fn length(&self) -> f64 {
        match &self.0 {
            geo::Geometry::LineString(line) => line.euclidean_length(),
            geo::Geometry::MultiLineString(lines) => lines.euclidean_length(),
            geo::Geometry::Polygon(polygon) => {
                polygon.exterior().euclidean_length()
                    + polygon
                        .interiors()
                        .iter()
                        .map(|ring| ring.euclidean_length())
                        .sum::<f64>()
            }
            _ => 0.0,
        }
    }

    pub fn bounding_rect(&self) -> Option<geo::Rect> {
        self.0.bounding_rect()
    }
}

/// Projection of geographic coordinates into Web Mercator.
pub struct PlanarProjection {
    projection: proj::Proj,
}

impl PlanarProjection {
    pub fn web_mercator() -> Result<Self, proj::ProjCreateError> {
        let projection = proj::Proj::new_known_crs(
            &epsg_code_to_authority_string(WGS84),
            &epsg_code_to_authority_string(WEB_MERCATOR),
            None,
        )?;
        Ok(Self { projection })
    }

    /// Project a lon/lat geometry. Only the geometry types taking part in conflation are
    /// supported.
    pub fn project(&self, geometry: &geo::Geometry) -> GeometryResult<PlanarGeometry> {
        let projected = match geometry {
            geo::Geometry::Point(point) => {
                geo::Geometry::Point(point.transformed(&self.projection)?)
            }
            geo::Geometry::LineString(line) => {
                geo::Geometry::LineString(line.transformed(&self.projection)?)
            }
            geo::Geometry::MultiLineString(lines) => {
                geo::Geometry::MultiLineString(lines.transformed(&self.projection)?)
            }
            geo::Geometry::Polygon(polygon) => {
                geo::Geometry::Polygon(polygon.transformed(&self.projection)?)
            }
            other => {
                return Err(GeometryError::Unsupported {
                    primary: geometry_type_name(other),
                    secondary: "planar projection",
                })
            }
        };
        Ok(PlanarGeometry(projected))
    }
}
