use crate::error::{GeometryError, GeometryResult};
use crate::geofile::{feature::Feature, tags::Tags};
use crate::similarity::geometry::{distance, slope_and_angle};
use crate::similarity::tags::compare_tags;

use super::index::{PreparedFeature, SecondaryIndex};
use super::params::ConflateParams;

/// Candidates this close in meters settle on a single identity tag match.
pub const CLOSE_DISTANCE: f64 = 2.0;

pub const NEW_FEATURE_FIXME: &str = "New features should be imported following OSM guidelines.";

/// One secondary feature that passed the geometric checks against a primary feature.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub hits: u8,
    pub distance: f64,
    pub angle: f64,
    pub slope: f64,
    pub name_ratio: u8,
    pub ref_ratio: u8,
    pub secondary: &'a Feature,
    /// Tags of both features merged.
    pub tags: Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationOutcome {
    /// All identity tags match. `unchanged` when the primary adds nothing to the secondary.
    StrongMatch {
        unchanged: bool,
    },
    /// Good enough to stop looking at other candidates.
    SettledMatch,
    WeakMatch {
        hits: u8,
    },
    Rejected,
}

/// The decision for one primary feature.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// Merged tags on the geometry and identity of the matched secondary feature.
    Merged(Feature),
    /// No counterpart in the secondary dataset.
    New(Feature),
    /// The secondary feature already says everything the primary does.
    Dropped,
}

/// Exactly one of name and ref matched, and the other is not tagged at all.
fn single_family_match(candidate: &Candidate, match_threshold: u8) -> bool {
    let name_absent = candidate.tags.name.is_none();
    let ref_absent = candidate.tags.reference.is_none() && candidate.tags.usfs_ref.is_none();
    (candidate.name_ratio >= match_threshold && ref_absent)
        || (candidate.ref_ratio >= match_threshold && name_absent)
}

/// Classify a candidate of `primary`. Rules are checked in order, the first one that applies
/// wins.
pub fn classify(
    primary: &Tags,
    candidate: &Candidate,
    match_threshold: u8,
) -> ClassificationOutcome {
    match candidate.hits {
        3 => ClassificationOutcome::StrongMatch {
            unchanged: primary.same_content(&candidate.secondary.tags),
        },
        2 if candidate.distance == 0.0 => ClassificationOutcome::SettledMatch,
        1 if candidate.distance <= CLOSE_DISTANCE
            && single_family_match(candidate, match_threshold) =>
        {
            ClassificationOutcome::SettledMatch
        }
        // The geometry coincides, the secondary probably lacks the name.
        0 if candidate.distance == 0.0
            && (primary.name.is_some() || primary.usfs_ref.is_some()) =>
        {
            ClassificationOutcome::WeakMatch { hits: 1 }
        }
        0 => ClassificationOutcome::Rejected,
        hits => ClassificationOutcome::WeakMatch { hits },
    }
}

/// Compare one primary feature with one secondary feature. Returns `None` when the pair is too
/// far apart or points in different directions.
pub fn score_candidate<'a>(
    primary: &PreparedFeature,
    secondary: &PreparedFeature<'a>,
    params: &ConflateParams,
) -> GeometryResult<Option<Candidate<'a>>> {
    let distance = distance(&primary.planar, &secondary.planar)?;
    if distance < 0.0 || distance >= params.distance_threshold {
        return Ok(None);
    }

    let (slope, angle) = slope_and_angle(&primary.planar, &secondary.planar);
    if angle.abs() > params.angle_threshold || slope.abs() > params.slope_threshold {
        log::debug!(
            "Primary {} and secondary {} differ in direction, angle: {:.3}, slope: {:.3}",
            primary.index,
            secondary.index,
            angle,
            slope
        );
        return Ok(None);
    }

    let comparison = compare_tags(
        &primary.feature.tags,
        &secondary.feature.tags,
        params.match_threshold,
    );
    Ok(Some(Candidate {
        hits: comparison.hits,
        distance,
        angle,
        slope,
        name_ratio: comparison.name_ratio,
        ref_ratio: comparison.ref_ratio,
        secondary: secondary.feature,
        tags: comparison.tags,
    }))
}

fn merge(candidate: Candidate, hits: u8) -> Feature {
    let secondary = candidate.secondary;
    let mut tags = candidate.tags;
    tags.id = secondary.tags.id;
    tags.version = Some(secondary.tags.version.map_or(1, |version| version + 1));
    tags.insert(
        "debug",
        format!(
            "hits: {}, dist: {:.3}, slope: {:.3}, angle: {:.3}",
            hits, candidate.distance, candidate.slope, candidate.angle
        ),
    );
    Feature {
        geometry: secondary.geometry.clone(),
        tags,
        refs: secondary.refs.clone(),
    }
}

fn flag_as_new(primary: &Feature) -> Feature {
    let mut feature = primary.clone();
    feature.tags.version = Some(1);
    feature.tags.insert("informal", "yes");
    feature.tags.insert("fixme", NEW_FEATURE_FIXME);
    feature
}

/// Decide whether `primary` already exists among the secondary features.
///
/// Candidates are visited in input order. A strong or settled match ends the scan, weak matches
/// are collected until `max_candidates` of them are found and the one with the most hits (the
/// first one on ties) is merged. Without any match the feature is new.
pub fn evaluate(
    primary: &PreparedFeature,
    index: &SecondaryIndex,
    params: &ConflateParams,
) -> MatchResult {
    let mut maybe: Vec<(u8, Candidate)> = Vec::new();

    for secondary in index.candidates_near(&primary.planar, params.distance_threshold) {
        let candidate = match score_candidate(primary, secondary, params) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => continue,
            Err(err @ GeometryError::Unsupported { .. }) => {
                log::debug!(
                    "Primary {}, secondary {}: {}",
                    primary.index,
                    secondary.index,
                    err
                );
                continue;
            }
            Err(err) => {
                log::warn!(
                    "Primary {}, secondary {}: {}",
                    primary.index,
                    secondary.index,
                    err
                );
                continue;
            }
        };

        match classify(&primary.feature.tags, &candidate, params.match_threshold) {
            ClassificationOutcome::StrongMatch { unchanged: true } => {
                log::debug!(
                    "Primary {} is identical to secondary {}",
                    primary.index,
                    secondary.index
                );
                return MatchResult::Dropped;
            }
            ClassificationOutcome::StrongMatch { unchanged: false }
            | ClassificationOutcome::SettledMatch => {
                let hits = candidate.hits;
                return MatchResult::Merged(merge(candidate, hits));
            }
            ClassificationOutcome::WeakMatch { hits } => {
                maybe.push((hits, candidate));
                if maybe.len() >= params.max_candidates {
                    log::debug!("Primary {} has enough candidates", primary.index);
                    break;
                }
            }
            ClassificationOutcome::Rejected => {}
        }
    }

    let best = maybe
        .into_iter()
        .reduce(|best, next| if next.0 > best.0 { next } else { best });
    match best {
        Some((hits, candidate)) => MatchResult::Merged(merge(candidate, hits)),
        None => MatchResult::New(flag_as_new(primary.feature)),
    }
}
