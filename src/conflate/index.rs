use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::crs::crs_utils::geometry_type_name;
use crate::crs::projection::{PlanarGeometry, PlanarProjection};
use crate::geofile::feature::Feature;

/// A feature eligible for conflation together with its planar geometry.
#[derive(Debug, Clone)]
pub struct PreparedFeature<'a> {
    /// Position of the feature in its input dataset.
    pub index: usize,
    pub feature: &'a Feature,
    pub planar: PlanarGeometry,
}

/// Project every feature that can take part in conflation. Points, missing geometries and
/// geometries that fail to project are left out.
pub fn prepare<'a>(
    features: &'a [Feature],
    projection: &PlanarProjection,
) -> Vec<PreparedFeature<'a>> {
    features
        .iter()
        .enumerate()
        .filter(|(_, feature)| feature.is_conflatable())
        .filter_map(|(index, feature)| {
            let geometry = feature.geometry.as_ref()?;
            match projection.project(geometry) {
                Ok(planar) => Some(PreparedFeature {
                    index,
                    feature,
                    planar,
                }),
                Err(err) => {
                    log::warn!(
                        "Skipping {} feature {}: {}",
                        geometry_type_name(geometry),
                        index,
                        err
                    );
                    None
                }
            }
        })
        .collect()
}

type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Spatial index over the planar envelopes of the secondary dataset.
pub struct SecondaryIndex<'a> {
    features: Vec<PreparedFeature<'a>>,
    rtree: RTree<IndexedEnvelope>,
}

impl<'a> SecondaryIndex<'a> {
    pub fn new(features: Vec<PreparedFeature<'a>>) -> Self {
        let envelopes = features
            .iter()
            .enumerate()
            .filter_map(|(position, prepared)| {
                let rect = prepared.planar.bounding_rect()?;
                Some(IndexedEnvelope::new(
                    Rectangle::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                    position,
                ))
            })
            .collect();
        Self {
            features,
            rtree: RTree::bulk_load(envelopes),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Features whose envelope lies within `max_distance` of the envelope of `geometry`, in
    /// input order.
    pub fn candidates_near(
        &self,
        geometry: &PlanarGeometry,
        max_distance: f64,
    ) -> Vec<&PreparedFeature<'a>> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners(
            [rect.min().x - max_distance, rect.min().y - max_distance],
            [rect.max().x + max_distance, rect.max().y + max_distance],
        );
        let mut positions: Vec<usize> = self
            .rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|indexed| indexed.data)
            .collect();
        positions.sort_unstable();
        positions
            .into_iter()
            .map(|position| &self.features[position])
            .collect()
    }
}
