//! Projecting GPS fixes onto route geometry.

use tracing::trace;

use crate::config::RouteConfig;
use crate::geometry::Location;
use crate::model::Block;
use crate::params::MatchingParams;

/// Where on a block's geometry a fix landed.
///
/// Ephemeral: recomputed for every report and only summarized into match
/// records for history.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialMatch {
    pub trip_index: usize,
    pub stop_path_index: usize,
    pub segment_index: usize,
    /// Meters from the start of the winning segment to the projection.
    pub distance_along_segment: f64,
    /// Meters from the start of the stop path to the projection.
    pub distance_along_path: f64,
    /// Meters from the fix to the projection; the match-quality metric.
    pub distance_from_segment: f64,
    /// Whether the projection is effectively at the path's stop.
    pub at_stop: bool,
}

/// Finds the globally closest segment among the candidate trips.
///
/// Every segment of every stop path of every candidate is scored by its
/// distance to the fix, after a cheap per-pattern extent pre-filter.
/// Matches farther than the per-route (or fleet-wide) cutoff are
/// discarded entirely. When two segments are within the tie-break epsilon
/// of each other, the earlier (stop path, segment) pair wins so a vehicle
/// sitting on overlapping geometry does not oscillate backwards.
pub fn best_match(
    block: &Block,
    candidate_trips: &[usize],
    loc: &Location,
    config: &RouteConfig,
    params: &MatchingParams,
) -> Option<SpatialMatch> {
    let mut best: Option<SpatialMatch> = None;

    for &trip_index in candidate_trips {
        let Some(trip) = block.trip(trip_index) else {
            // Candidate indices come from schedule arithmetic; skip any
            // that fell out of range rather than trusting them
            continue;
        };
        let max_distance = config
            .route(trip.route_id())
            .and_then(|r| r.max_distance_from_segment)
            .unwrap_or(params.max_distance_from_segment_m);

        let pattern = trip.pattern();
        if !pattern.extent().is_within_distance(loc, max_distance) {
            continue;
        }

        for (stop_path_index, path) in pattern.stop_paths().iter().enumerate() {
            for (segment_index, segment) in path.segments().iter().enumerate() {
                let distance = segment.distance(loc);
                if distance > max_distance {
                    continue;
                }
                let better = match &best {
                    None => true,
                    Some(current) => distance + params.tie_break_epsilon_m
                        < current.distance_from_segment,
                };
                if !better {
                    continue;
                }

                let along_segment = segment.match_distance_along(loc);
                let Some(along_path) = path.distance_along(segment_index, along_segment)
                else {
                    continue;
                };
                let at_stop_tolerance = config
                    .stop(path.stop_id())
                    .and_then(|s| s.radius_m)
                    .unwrap_or(params.at_stop_tolerance_m);
                let at_stop = along_path >= path.length() - at_stop_tolerance;
                best = Some(SpatialMatch {
                    trip_index,
                    stop_path_index,
                    segment_index,
                    distance_along_segment: along_segment,
                    distance_along_path: along_path,
                    distance_from_segment: distance,
                    at_stop,
                });
            }
        }
    }

    if let Some(m) = &best {
        trace!(
            trip = m.trip_index,
            path = m.stop_path_index,
            segment = m.segment_index,
            distance = m.distance_from_segment,
            "spatial match"
        );
    }
    best
}

/// Distance from the start of the trip's pattern to the match, in meters.
/// Used to interpolate event times between two fixes.
pub fn distance_along_trip(block: &Block, m: &SpatialMatch) -> Option<f64> {
    let trip = block.trip(m.trip_index)?;
    let prior: f64 = trip
        .pattern()
        .stop_paths()
        .get(..m.stop_path_index)?
        .iter()
        .map(|p| p.length())
        .sum();
    Some(prior + m.distance_along_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigData, ConfigRevision};
    use crate::geometry::METERS_PER_DEGREE;
    use crate::identifiers::*;
    use crate::model::stop_path::{StopPath, TripPattern};
    use crate::model::trip::{Trip, TripSchedule};
    use crate::model::types::ScheduleTime;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    // Equator coordinates expressed in meters east/north of the origin
    fn loc_m(east: f64, north: f64) -> Location {
        Location::new(north / METERS_PER_DEGREE, east / METERS_PER_DEGREE)
    }

    fn path_m(stop: &str, points: &[(f64, f64)]) -> StopPath {
        let locations: Vec<Location> = points.iter().map(|(e, n)| loc_m(*e, *n)).collect();
        StopPath::new(StopIdentifier::new(stop), &locations).unwrap()
    }

    fn block_of(paths: Vec<StopPath>) -> (Block, RouteConfig) {
        let pattern = Arc::new(TripPattern::new(
            "shape",
            RouteIdentifier::new("r1"),
            paths,
        ));
        let n = pattern.stop_paths().len();
        let times = (0..n)
            .map(|i| ScheduleTime::new(Some(i as i32 * 60), Some(i as i32 * 60)))
            .collect();
        let trip = Arc::new(
            Trip::new(
                TripIdentifier::new("t1"),
                pattern,
                0,
                n as i32 * 60,
                TripSchedule::Fixed { times },
            )
            .unwrap(),
        );
        let block = Block::new(
            BlockIdentifier::new("b1"),
            ServiceIdentifier::new("svc"),
            vec![trip],
        );
        let config = RouteConfig::from_data(
            ConfigRevision(1),
            ConfigData {
                stops: vec![],
                routes: vec![],
                blocks: vec![block.clone()],
            },
        )
        .unwrap();
        (block, config)
    }

    #[test]
    fn test_distance_along_two_segment_path() {
        // Segment 1 is 80m, segment 2 is 40m: total path length 120m
        let (block, config) = block_of(vec![path_m(
            "s1",
            &[(0.0, 0.0), (0.0, 80.0), (0.0, 120.0)],
        )]);
        let params = MatchingParams::default();

        // 110m up the path, 5m off to the side: 30m into segment 2
        let fix = loc_m(5.0, 110.0);
        let m = best_match(&block, &[0], &fix, &config, &params).unwrap();
        assert_eq!(m.stop_path_index, 0);
        assert_eq!(m.segment_index, 1);
        assert_relative_eq!(m.distance_along_segment, 30.0, max_relative = 1e-3);
        assert_relative_eq!(m.distance_along_path, 110.0, max_relative = 1e-3);
        assert_relative_eq!(m.distance_from_segment, 5.0, max_relative = 1e-3);
    }

    #[test]
    fn test_cutoff_rejects_distant_fix() {
        let (block, config) = block_of(vec![path_m("s1", &[(0.0, 0.0), (0.0, 100.0)])]);
        let params = MatchingParams::default(); // 60m cutoff

        let near = loc_m(50.0, 50.0);
        assert!(best_match(&block, &[0], &near, &config, &params).is_some());

        let far = loc_m(100.0, 50.0);
        assert!(best_match(&block, &[0], &far, &config, &params).is_none());
    }

    #[test]
    fn test_tie_break_prefers_earlier_segment() {
        // Two stop paths traversing the same street: an out-and-back loop
        let (block, config) = block_of(vec![
            path_m("out", &[(0.0, 0.0), (0.0, 100.0)]),
            path_m("back", &[(0.0, 100.0), (0.0, 0.0)]),
        ]);
        let params = MatchingParams::default();

        let fix = loc_m(2.0, 50.0);
        let m = best_match(&block, &[0], &fix, &config, &params).unwrap();
        assert_eq!(m.stop_path_index, 0);
        assert_eq!(m.segment_index, 0);
    }

    #[test]
    fn test_at_stop_near_end_of_path() {
        let (block, config) = block_of(vec![path_m("s1", &[(0.0, 0.0), (0.0, 100.0)])]);
        let params = MatchingParams::default(); // 15m tolerance

        let approaching = loc_m(0.0, 80.0);
        let m = best_match(&block, &[0], &approaching, &config, &params).unwrap();
        assert!(!m.at_stop);

        let arrived = loc_m(0.0, 95.0);
        let m = best_match(&block, &[0], &arrived, &config, &params).unwrap();
        assert!(m.at_stop);
    }

    #[test]
    fn test_route_override_tightens_cutoff() {
        let (block, _) = block_of(vec![path_m("s1", &[(0.0, 0.0), (0.0, 100.0)])]);
        let config = RouteConfig::from_data(
            ConfigRevision(1),
            ConfigData {
                stops: vec![],
                routes: vec![crate::model::Route::new(RouteIdentifier::new("r1"), "1", "One")
                    .with_max_distance_from_segment(5.0)],
                blocks: vec![block.clone()],
            },
        )
        .unwrap();
        let params = MatchingParams::default();

        // 10m off: inside the fleet-wide 60m but outside the route's 5m
        let fix = loc_m(10.0, 50.0);
        assert!(best_match(&block, &[0], &fix, &config, &params).is_none());
    }

    #[test]
    fn test_stop_radius_overrides_at_stop_tolerance() {
        let (block, _) = block_of(vec![path_m("s1", &[(0.0, 0.0), (0.0, 100.0)])]);
        let config = RouteConfig::from_data(
            ConfigRevision(1),
            ConfigData {
                stops: vec![{
                    let mut stop = crate::model::Stop::new(
                        StopIdentifier::new("s1"),
                        "One",
                        loc_m(0.0, 100.0),
                    );
                    stop.radius_m = Some(40.0);
                    stop
                }],
                routes: vec![],
                blocks: vec![block.clone()],
            },
        )
        .unwrap();
        let params = MatchingParams::default(); // 15m fleet-wide

        // 70m along: within the stop's enlarged 40m zone only
        let fix = loc_m(0.0, 70.0);
        let m = best_match(&block, &[0], &fix, &config, &params).unwrap();
        assert!(m.at_stop);
    }

    #[test]
    fn test_matching_is_idempotent() {
        let (block, config) = block_of(vec![path_m(
            "s1",
            &[(0.0, 0.0), (10.0, 80.0), (30.0, 120.0)],
        )]);
        let params = MatchingParams::default();
        let fix = loc_m(12.0, 90.0);

        let a = best_match(&block, &[0], &fix, &config, &params).unwrap();
        let b = best_match(&block, &[0], &fix, &config, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_out_of_range_candidate_ignored() {
        let (block, config) = block_of(vec![path_m("s1", &[(0.0, 0.0), (0.0, 100.0)])]);
        let params = MatchingParams::default();
        let fix = loc_m(0.0, 50.0);

        // Index 5 does not exist; matching proceeds with the valid one
        let m = best_match(&block, &[5, 0], &fix, &config, &params);
        assert!(m.is_some());
    }

    #[test]
    fn test_distance_along_trip_spans_paths() {
        let (block, config) = block_of(vec![
            path_m("s1", &[(0.0, 0.0), (0.0, 100.0)]),
            path_m("s2", &[(0.0, 100.0), (0.0, 250.0)]),
        ]);
        let params = MatchingParams::default();

        let fix = loc_m(0.0, 180.0);
        let m = best_match(&block, &[0], &fix, &config, &params).unwrap();
        assert_eq!(m.stop_path_index, 1);
        assert_relative_eq!(
            distance_along_trip(&block, &m).unwrap(),
            180.0,
            max_relative = 1e-3
        );
    }
}
