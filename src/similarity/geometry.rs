use geo::{Centroid, ConvexHull, EuclideanDistance, Intersects};

use crate::crs::crs_utils::geometry_type_name;
use crate::crs::projection::PlanarGeometry;
use crate::error::{GeometryError, GeometryResult};

/// Lines whose lengths differ by more than this many meters are not compared segment by segment.
pub const LENGTH_MISMATCH_THRESHOLD: f64 = 1000.0;

/// Returned by [`distance`] for a length mismatch whose hulls do not overlap. Callers must treat
/// it as "do not compare", never as a close match.
pub const MISMATCH_SENTINEL: f64 = -1.0;

/// Index offset from both ends of a line at which the chord for the slope is sampled.
// TODO: sample at a fixed distance along the line instead of a vertex offset.
pub const SLOPE_SAMPLE_OFFSET: usize = 2;

fn min_distance(distances: impl Iterator<Item = f64>) -> GeometryResult<f64> {
    distances
        .filter(|distance| distance.is_finite())
        .reduce(f64::min)
        .ok_or(GeometryError::Degenerate)
}

/// Component lines that actually have a segment.
fn usable_lines(geometry: &PlanarGeometry) -> Vec<&geo::LineString> {
    geometry
        .lines()
        .into_iter()
        .filter(|line| line.0.len() > 1)
        .collect()
}

/// Both hulls must touch the other geometry for the pair to count as the same object.
fn hulls_overlap(a: &PlanarGeometry, b: &PlanarGeometry) -> bool {
    let touches = |hull: &geo::Polygon, other: &PlanarGeometry| {
        other.lines().into_iter().any(|line| hull.intersects(line))
    };
    let hull_a = geo::MultiLineString::new(a.lines().into_iter().cloned().collect()).convex_hull();
    let hull_b = geo::MultiLineString::new(b.lines().into_iter().cloned().collect()).convex_hull();
    touches(&hull_a, b) && touches(&hull_b, a)
}

fn unsupported(a: &PlanarGeometry, b: &PlanarGeometry) -> GeometryError {
    GeometryError::Unsupported {
        primary: geometry_type_name(a.geometry()),
        secondary: geometry_type_name(b.geometry()),
    }
}

/// Minimum planar distance in meters between two projected geometries.
///
/// Lines with a gross length mismatch are not measured: they are either considered identical
/// (`0.0`, when the convex hull of each one touches the other) or not comparable
/// ([`MISMATCH_SENTINEL`]). Otherwise `a` is decomposed into its lines and the smallest distance
/// of any of them to `b` is returned. Points are compared to the centroid of a polygon. Polygons
/// cannot be compared with lines or other polygons.
pub fn distance(a: &PlanarGeometry, b: &PlanarGeometry) -> GeometryResult<f64> {
    if a.is_empty() || b.is_empty() {
        return Err(GeometryError::Degenerate);
    }

    if a.is_lineal() && b.is_lineal() {
        if (a.length() - b.length()).abs() > LENGTH_MISMATCH_THRESHOLD {
            log::debug!(
                "Length mismatch of {:.0}m, comparing convex hulls",
                (a.length() - b.length()).abs()
            );
            return Ok(if hulls_overlap(a, b) {
                0.0
            } else {
                MISMATCH_SENTINEL
            });
        }
        let lines_b = usable_lines(b);
        return min_distance(usable_lines(a).into_iter().flat_map(|line_a| {
            lines_b
                .iter()
                .map(move |line_b| line_a.euclidean_distance(*line_b))
        }));
    }

    match (a.geometry(), b.geometry()) {
        (geo::Geometry::Point(p), geo::Geometry::Point(q)) => Ok(p.euclidean_distance(q)),
        (geo::Geometry::Point(point), _) if b.is_lineal() => min_distance(
            usable_lines(b)
                .into_iter()
                .map(|line| point.euclidean_distance(line)),
        ),
        (_, geo::Geometry::Point(point)) if a.is_lineal() => min_distance(
            usable_lines(a)
                .into_iter()
                .map(|line| point.euclidean_distance(line)),
        ),
        (geo::Geometry::Point(point), geo::Geometry::Polygon(polygon))
        | (geo::Geometry::Polygon(polygon), geo::Geometry::Point(point)) => polygon
            .centroid()
            .map(|centroid| point.euclidean_distance(&centroid))
            .ok_or(GeometryError::Degenerate),
        _ => Err(unsupported(a, b)),
    }
}

fn nan_to_zero(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

/// Slope of the chord between the sampled points, if the line has enough points.
fn chord_slope(line: &geo::LineString) -> Option<f64> {
    let count = line.0.len();
    if count <= SLOPE_SAMPLE_OFFSET {
        return None;
    }
    let start = line.0[SLOPE_SAMPLE_OFFSET];
    let end = line.0[count - SLOPE_SAMPLE_OFFSET];
    let slope = (end.y - start.y) / (end.x - start.x);
    Some(if slope.is_finite() { slope } else { 0.0 })
}

/// Slope difference and angle in degrees between two lines.
///
/// Returns `(0.0, 0.0)` when no line pair has enough points to sample, which means "no slope
/// signal" rather than "aligned". For multi-part geometries the pair with the smallest angle
/// wins.
pub fn slope_and_angle(a: &PlanarGeometry, b: &PlanarGeometry) -> (f64, f64) {
    let slopes_b: Vec<f64> = b.lines().into_iter().filter_map(chord_slope).collect();
    let mut best: Option<(f64, f64)> = None;
    for slope_a in a.lines().into_iter().filter_map(chord_slope) {
        for slope_b in &slopes_b {
            let angle = ((slope_b - slope_a) / (1.0 + slope_a * slope_b))
                .atan()
                .to_degrees();
            let angle = nan_to_zero(angle);
            let slope = nan_to_zero(slope_a - slope_b);
            if best.map_or(true, |(_, best_angle)| angle.abs() < best_angle.abs()) {
                best = Some((slope, angle));
            }
        }
    }
    best.unwrap_or((0.0, 0.0))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    use crate::crs::projection::PlanarGeometry;
    use crate::error::GeometryError;

    use super::{distance, slope_and_angle, MISMATCH_SENTINEL};

    fn planar_line(coords: Vec<(f64, f64)>) -> PlanarGeometry {
        PlanarGeometry::from_projected(geo::Geometry::LineString(coords.into()))
    }

    fn planar_point(x: f64, y: f64) -> PlanarGeometry {
        PlanarGeometry::from_projected(geo::Geometry::Point(geo::Point::new(x, y)))
    }

    fn planar_square(origin: f64, size: f64) -> PlanarGeometry {
        PlanarGeometry::from_projected(geo::Geometry::Polygon(geo::Polygon::new(
            vec![
                (origin, origin),
                (origin + size, origin),
                (origin + size, origin + size),
                (origin, origin + size),
                (origin, origin),
            ]
            .into(),
            vec![],
        )))
    }

    #[test]
    fn test_distance_to_itself_is_zero() {
        let line = planar_line(vec![(0.0, 0.0), (50.0, 10.0), (100.0, 0.0)]);
        assert_eq!(0.0, distance(&line, &line).unwrap());
    }

    #[rstest]
    #[case(planar_line(vec![(0.0, 3.0), (100.0, 3.0)]), 3.0)]
    #[case(planar_line(vec![(0.0, -6.5), (100.0, -6.5)]), 6.5)]
    #[case(planar_line(vec![(103.0, 4.0), (200.0, 4.0)]), 5.0)]
    #[case(planar_point(50.0, 12.0), 12.0)]
    fn test_distance_to_line(#[case] other: PlanarGeometry, #[case] expected: f64) {
        let line = planar_line(vec![(0.0, 0.0), (100.0, 0.0)]);
        assert_abs_diff_eq!(expected, distance(&other, &line).unwrap(), epsilon = 1e-9);
        assert_abs_diff_eq!(expected, distance(&line, &other).unwrap(), epsilon = 1e-9);
    }

    #[test]
    fn test_distance_uses_nearest_part_of_multilinestring() {
        let multi = PlanarGeometry::from_projected(geo::Geometry::MultiLineString(
            geo::MultiLineString::new(vec![
                vec![(0.0, 40.0), (100.0, 40.0)].into(),
                vec![(0.0, 2.0), (100.0, 2.0)].into(),
            ]),
        ));
        let line = planar_line(vec![(0.0, 0.0), (100.0, 0.0)]);
        assert_abs_diff_eq!(2.0, distance(&multi, &line).unwrap(), epsilon = 1e-9);
    }

    #[test]
    fn test_point_to_point() {
        let distance = distance(&planar_point(0.0, 0.0), &planar_point(3.0, 4.0)).unwrap();
        assert_abs_diff_eq!(5.0, distance, epsilon = 1e-9);
    }

    #[test]
    fn test_point_to_polygon_uses_centroid() {
        let square = planar_square(0.0, 10.0);
        // Inside the polygon, but 5m away from its centroid.
        let point = planar_point(5.0, 0.0);
        assert_abs_diff_eq!(5.0, distance(&point, &square).unwrap(), epsilon = 1e-9);
    }

    #[test]
    fn test_polygon_pairs_are_unsupported() {
        let result = distance(&planar_square(0.0, 10.0), &planar_square(1.0, 10.0));
        assert!(matches!(
            result,
            Err(GeometryError::Unsupported {
                primary: "Polygon",
                secondary: "Polygon"
            })
        ));
        let line = planar_line(vec![(0.0, 0.0), (10.0, 0.0)]);
        assert!(distance(&line, &planar_square(0.0, 10.0)).is_err());
    }

    #[test]
    fn test_empty_geometry_is_degenerate() {
        let empty = planar_line(vec![]);
        let line = planar_line(vec![(0.0, 0.0), (10.0, 0.0)]);
        assert!(matches!(
            distance(&empty, &line),
            Err(GeometryError::Degenerate)
        ));
    }

    #[test]
    fn test_length_mismatch_without_overlap_is_sentinel() {
        let long = planar_line(vec![(0.0, 0.0), (4000.0, 0.0)]);
        let short = planar_line(vec![(0.0, 500.0), (100.0, 500.0)]);
        assert_eq!(MISMATCH_SENTINEL, distance(&long, &short).unwrap());
        assert_eq!(MISMATCH_SENTINEL, distance(&short, &long).unwrap());
    }

    #[test]
    fn test_length_mismatch_with_overlapping_hulls_is_identical() {
        // A long bent road and a short piece crossing it: each hull touches the other line.
        let long = planar_line(vec![(0.0, 0.0), (2000.0, 2000.0), (4000.0, 0.0)]);
        let short = planar_line(vec![(1000.0, 900.0), (1000.0, 1100.0)]);
        assert_eq!(0.0, distance(&long, &short).unwrap());
    }

    #[rstest]
    #[case(vec![(0.0, 0.0), (4000.0, 0.0)], vec![(0.0, 500.0), (100.0, 500.0)])]
    #[case(vec![(0.0, 0.0), (2000.0, 2000.0), (4000.0, 0.0)], vec![(1000.0, 900.0), (1000.0, 1100.0)])]
    #[case(vec![(0.0, 0.0), (0.0, 1500.0)], vec![(5.0, 0.0), (5.0, 300.0)])]
    fn test_length_mismatch_is_never_intermediate(
        #[case] a: Vec<(f64, f64)>,
        #[case] b: Vec<(f64, f64)>,
    ) {
        let distance = distance(&planar_line(a), &planar_line(b)).unwrap();
        assert!(distance == 0.0 || distance == MISMATCH_SENTINEL);
    }

    #[test]
    fn test_parallel_lines_have_no_angle() {
        let a = planar_line(vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (20.0, 0.0),
            (30.0, 10.0),
            (40.0, 10.0),
        ]);
        let b = planar_line(vec![
            (0.0, 3.0),
            (10.0, 3.0),
            (20.0, 3.0),
            (30.0, 13.0),
            (40.0, 13.0),
        ]);
        let (slope, angle) = slope_and_angle(&a, &b);
        assert_abs_diff_eq!(0.0, slope, epsilon = 1e-9);
        assert_abs_diff_eq!(0.0, angle, epsilon = 1e-9);
    }

    #[test]
    fn test_crossing_lines_have_angle() {
        // Chords sampled at index 2 and n - 2: slope 0 for `a`, slope 1 for `b`.
        let a = planar_line(vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (20.0, 0.0),
            (30.0, 0.0),
            (40.0, 0.0),
            (50.0, 0.0),
        ]);
        let b = planar_line(vec![
            (0.0, 0.0),
            (10.0, 10.0),
            (20.0, 20.0),
            (30.0, 30.0),
            (40.0, 40.0),
            (50.0, 50.0),
        ]);
        let (slope, angle) = slope_and_angle(&a, &b);
        assert_abs_diff_eq!(-1.0, slope, epsilon = 1e-9);
        assert_abs_diff_eq!(45.0, angle, epsilon = 1e-9);

        let (slope, angle) = slope_and_angle(&b, &a);
        assert_abs_diff_eq!(1.0, slope, epsilon = 1e-9);
        assert_abs_diff_eq!(-45.0, angle, epsilon = 1e-9);
    }

    #[rstest]
    #[case(vec![(0.0, 0.0), (10.0, 0.0)])]
    #[case(vec![])]
    fn test_too_few_points_give_no_signal(#[case] coords: Vec<(f64, f64)>) {
        let short = planar_line(coords);
        let line = planar_line(vec![
            (0.0, 0.0),
            (10.0, 10.0),
            (20.0, 20.0),
            (30.0, 30.0),
            (40.0, 40.0),
        ]);
        assert_eq!((0.0, 0.0), slope_and_angle(&short, &line));
        assert_eq!((0.0, 0.0), slope_and_angle(&line, &short));
    }

    #[test]
    fn test_vertical_chord_is_coerced() {
        let vertical = planar_line(vec![
            (0.0, 0.0),
            (0.0, 10.0),
            (0.0, 20.0),
            (0.0, 30.0),
            (0.0, 40.0),
        ]);
        let (slope, angle) = slope_and_angle(&vertical, &vertical);
        assert_eq!(0.0, slope);
        assert_eq!(0.0, angle);
    }

    #[test]
    fn test_multilinestring_keeps_smallest_angle() {
        let multi = PlanarGeometry::from_projected(geo::Geometry::MultiLineString(
            geo::MultiLineString::new(vec![
                vec![
                    (0.0, 0.0),
                    (10.0, 10.0),
                    (20.0, 20.0),
                    (30.0, 30.0),
                    (40.0, 40.0),
                ]
                .into(),
                vec![
                    (0.0, 5.0),
                    (10.0, 6.0),
                    (20.0, 7.0),
                    (30.0, 8.0),
                    (40.0, 9.0),
                ]
                .into(),
            ]),
        ));
        let flat = planar_line(vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (20.0, 0.0),
            (30.0, 0.0),
            (40.0, 0.0),
        ]);
        let (slope, angle) = slope_and_angle(&multi, &flat);
        assert_abs_diff_eq!(0.1, slope, epsilon = 1e-9);
        assert_abs_diff_eq!(-0.1f64.atan().to_degrees(), angle, epsilon = 1e-9);
    }
}
