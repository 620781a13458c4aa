//! Arrival and departure events derived from consecutive matches.

use tracing::debug;

use crate::identifiers::*;
use crate::matcher::spatial::distance_along_trip;
use crate::matcher::temporal::closest_day_probe;
use crate::model::trip::{Trip, TripSchedule};
use crate::model::Block;
use crate::vehicle::Match;

/// A vehicle reaching or leaving a stop. Write-once.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrivalDeparture {
    pub vehicle_id: VehicleIdentifier,
    /// Epoch seconds of the event.
    pub time: i64,
    pub stop_id: StopIdentifier,
    pub stop_path_index: usize,
    pub trip_id: TripIdentifier,
    pub route_id: RouteIdentifier,
    pub block_id: BlockIdentifier,
    pub is_arrival: bool,
    /// Schedule time for adherence, seconds into the service day. Only
    /// attached when the event type and stop position allow it.
    pub scheduled_secs: Option<i32>,
    /// Time spent at the stop; departures only.
    pub dwell_secs: Option<i64>,
}

/// Identity of an [`ArrivalDeparture`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrivalDepartureKey {
    pub vehicle_id: VehicleIdentifier,
    pub time: i64,
    pub stop_id: StopIdentifier,
    pub is_arrival: bool,
}

impl ArrivalDeparture {
    pub fn key(&self) -> ArrivalDepartureKey {
        ArrivalDepartureKey {
            vehicle_id: self.vehicle_id.clone(),
            time: self.time,
            stop_id: self.stop_id.clone(),
            is_arrival: self.is_arrival,
        }
    }

    /// The same event at a different time; every other field is kept.
    pub fn with_time(&self, time: i64) -> Self {
        Self {
            time,
            ..self.clone()
        }
    }
}

/// A schedule time is only attached when it is meaningful for adherence:
/// an arrival at the trip's final stop with an arrival time in the
/// schedule, or a departure from a non-final stop with a departure time.
/// Exact-times frequency trips use the synthetic run closest to the
/// event.
pub fn scheduled_secs_for_event(
    trip: &Trip,
    stop_path_index: usize,
    is_arrival: bool,
    actual_secs: i32,
) -> Option<i32> {
    let entry = trip.schedule_time(stop_path_index)?;
    let last = trip.is_last_stop_path(stop_path_index);
    let applicable = match (is_arrival, last) {
        (true, true) => entry.arrival,
        (false, false) => entry.departure,
        _ => None,
    };
    let base = applicable?;

    match trip.schedule() {
        TripSchedule::Fixed { .. } => Some(base),
        TripSchedule::Frequency {
            headway_secs,
            exact_times,
            ..
        } => {
            if !exact_times || *headway_secs == 0 {
                return None;
            }
            let headway = *headway_secs as i32;
            let actual = closest_day_probe(base, actual_secs);
            let n = ((actual - base) as f64 / headway as f64).round().max(0.0) as i32;
            Some(base + n * headway)
        }
    }
}

/// Derive the arrival/departure events implied by moving from `prev` to
/// `current`.
///
/// Stops crossed between the two fixes get events at times interpolated
/// linearly by distance along the trip. `last_arrival` carries the
/// arrival time of the stop the vehicle was dwelling at, so its eventual
/// departure can record a dwell time; it is updated here.
///
/// Matches on different trips produce no cross-trip events: progress
/// restarts on the new trip. A match that moved backwards along the trip
/// (GPS jitter around a stop) produces nothing.
pub fn derive_events(
    block: &Block,
    prev: Option<&Match>,
    current: &Match,
    last_arrival: &mut Option<(StopIdentifier, i64)>,
    service_day_start: i64,
) -> Vec<ArrivalDeparture> {
    let Some(trip) = block.trip(current.spatial.trip_index) else {
        return Vec::new();
    };
    let pattern = trip.pattern();
    let mut events = Vec::new();

    let make = |stop_path_index: usize, is_arrival: bool, time: i64, dwell: Option<i64>| {
        let stop_id = pattern
            .stop_path(stop_path_index)
            .map(|p| p.stop_id().clone())?;
        let actual_secs = (time - service_day_start) as i32;
        Some(ArrivalDeparture {
            vehicle_id: current.vehicle_id.clone(),
            time,
            stop_id,
            stop_path_index,
            trip_id: current.trip_id.clone(),
            route_id: current.route_id.clone(),
            block_id: current.block_id.clone(),
            is_arrival,
            scheduled_secs: scheduled_secs_for_event(trip, stop_path_index, is_arrival, actual_secs),
            dwell_secs: dwell,
        })
    };

    // With no usable previous match (first observation, or progress
    // restarted on a new trip) only a direct arrival can be derived
    let prev = match prev {
        Some(p) if p.trip_id == current.trip_id => p,
        _ => {
            if current.spatial.at_stop {
                if let Some(arrival) =
                    make(current.spatial.stop_path_index, true, current.time, None)
                {
                    *last_arrival = Some((arrival.stop_id.clone(), arrival.time));
                    events.push(arrival);
                }
            }
            return events;
        }
    };

    let i = prev.spatial.stop_path_index;
    let j = current.spatial.stop_path_index;
    if j < i {
        return Vec::new();
    }

    if i == j {
        // Arrived at the stop this path leads to
        if !prev.spatial.at_stop && current.spatial.at_stop {
            if let Some(arrival) = make(j, true, current.time, None) {
                *last_arrival = Some((arrival.stop_id.clone(), arrival.time));
                events.push(arrival);
            }
        }
        return events;
    }

    // Crossed one or more stops between the fixes: interpolate by
    // distance along the trip.
    let (Some(d_prev), Some(d_cur)) = (
        distance_along_trip(block, &prev.spatial),
        distance_along_trip(block, &current.spatial),
    ) else {
        return Vec::new();
    };
    let span = d_cur - d_prev;
    let interpolate = |d: f64| -> i64 {
        if span <= 0.0 {
            return prev.time;
        }
        let fraction = ((d - d_prev) / span).clamp(0.0, 1.0);
        prev.time + ((current.time - prev.time) as f64 * fraction) as i64
    };

    // Cumulative distance to the end of each path
    let mut boundary = 0.0;
    let boundaries: Vec<f64> = pattern
        .stop_paths()
        .iter()
        .map(|p| {
            boundary += p.length();
            boundary
        })
        .collect();

    for crossed in i..j {
        // Indices come from matches against possibly different snapshots
        // of the trip; a missing boundary means the pattern shrank
        let Some(&crossing) = boundaries.get(crossed) else {
            continue;
        };
        let t = interpolate(crossing);

        if crossed == i && prev.spatial.at_stop {
            // Already arrived on an earlier report; only the departure is new
            let dwell = match last_arrival.take() {
                Some((stop, arrived))
                    if pattern.stop_path(crossed).map(|p| p.stop_id()) == Some(&stop) =>
                {
                    Some((t - arrived).max(0))
                }
                _ => None,
            };
            if let Some(departure) = make(crossed, false, t, dwell) {
                events.push(departure);
            }
        } else {
            // Passed through without a fix at the stop: arrival and
            // departure collapse to the boundary crossing
            if let Some(arrival) = make(crossed, true, t, None) {
                events.push(arrival);
            }
            if let Some(departure) = make(crossed, false, t, Some(0)) {
                events.push(departure);
            }
            *last_arrival = None;
        }
    }

    if current.spatial.at_stop {
        if let Some(arrival) = make(j, true, current.time, None) {
            *last_arrival = Some((arrival.stop_id.clone(), arrival.time));
            events.push(arrival);
        }
    }

    debug!(
        vehicle = %current.vehicle_id,
        count = events.len(),
        from_path = i,
        to_path = j,
        "derived stop events"
    );
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Location, METERS_PER_DEGREE};
    use crate::matcher::{SpatialMatch, TemporalMatch};
    use crate::model::stop_path::{StopPath, TripPattern};
    use crate::model::types::ScheduleTime;
    use std::sync::Arc;

    fn loc_m(east: f64, north: f64) -> Location {
        Location::new(north / METERS_PER_DEGREE, east / METERS_PER_DEGREE)
    }

    // Three stops, each path 100m long, straight north
    fn test_block() -> Block {
        let paths = vec![
            StopPath::new(StopIdentifier::new("s0"), &[loc_m(0.0, 0.0), loc_m(0.0, 100.0)])
                .unwrap(),
            StopPath::new(
                StopIdentifier::new("s1"),
                &[loc_m(0.0, 100.0), loc_m(0.0, 200.0)],
            )
            .unwrap(),
            StopPath::new(
                StopIdentifier::new("s2"),
                &[loc_m(0.0, 200.0), loc_m(0.0, 300.0)],
            )
            .unwrap(),
        ];
        let pattern = Arc::new(TripPattern::new(
            "shape",
            RouteIdentifier::new("r1"),
            paths,
        ));
        let trip = Trip::new(
            TripIdentifier::new("t1"),
            pattern,
            0,
            600,
            TripSchedule::Fixed {
                times: vec![
                    ScheduleTime::departure_only(0),
                    ScheduleTime::new(Some(280), Some(300)),
                    ScheduleTime::arrival_only(600),
                ],
            },
        )
        .unwrap();
        Block::new(
            BlockIdentifier::new("b1"),
            ServiceIdentifier::new("svc"),
            vec![Arc::new(trip)],
        )
    }

    fn match_at(time: i64, path: usize, along: f64, at_stop: bool) -> Match {
        Match {
            vehicle_id: VehicleIdentifier::new("v1"),
            time,
            block_id: BlockIdentifier::new("b1"),
            trip_id: TripIdentifier::new("t1"),
            route_id: RouteIdentifier::new("r1"),
            spatial: SpatialMatch {
                trip_index: 0,
                stop_path_index: path,
                segment_index: 0,
                distance_along_segment: along,
                distance_along_path: along,
                distance_from_segment: 2.0,
                at_stop,
            },
            temporal: TemporalMatch {
                scheduled_secs: None,
                adherence_secs: None,
                is_layover: false,
                is_wait_stop: false,
                is_delayed: false,
            },
        }
    }

    #[test]
    fn test_arrival_when_reaching_stop() {
        let block = test_block();
        let mut last_arrival = None;
        let prev = match_at(100, 0, 50.0, false);
        let current = match_at(120, 0, 95.0, true);

        let events = derive_events(&block, Some(&prev), &current, &mut last_arrival, 0);
        assert_eq!(events.len(), 1);
        let arrival = &events[0];
        assert!(arrival.is_arrival);
        assert_eq!(arrival.stop_id, StopIdentifier::new("s0"));
        assert_eq!(arrival.time, 120);
        // First stop of the trip: arrivals carry no schedule time
        assert_eq!(arrival.scheduled_secs, None);
        assert_eq!(last_arrival, Some((StopIdentifier::new("s0"), 120)));
    }

    #[test]
    fn test_departure_with_dwell() {
        let block = test_block();
        let mut last_arrival = Some((StopIdentifier::new("s0"), 120));
        let prev = match_at(140, 0, 95.0, true);
        let current = match_at(160, 1, 40.0, false);

        let events = derive_events(&block, Some(&prev), &current, &mut last_arrival, 0);
        assert_eq!(events.len(), 1);
        let departure = &events[0];
        assert!(!departure.is_arrival);
        assert_eq!(departure.stop_id, StopIdentifier::new("s0"));
        // Departure from a non-final stop carries the departure time
        assert_eq!(departure.scheduled_secs, Some(0));
        // Interpolated boundary crossing happened between the fixes
        assert!(departure.time >= 140 && departure.time <= 160);
        assert_eq!(departure.dwell_secs, Some(departure.time - 120));
        assert!(last_arrival.is_none());
    }

    #[test]
    fn test_skipped_stop_gets_interpolated_pair() {
        let block = test_block();
        let mut last_arrival = None;
        // From mid-path 0 to mid-path 2 in one leap: stop s0 and s1 crossed
        let prev = match_at(100, 0, 50.0, false);
        let current = match_at(200, 2, 50.0, false);

        let events = derive_events(&block, Some(&prev), &current, &mut last_arrival, 0);
        // s0: arrival+departure, s1: arrival+departure
        assert_eq!(events.len(), 4);
        assert!(events[0].is_arrival && events[0].stop_id == StopIdentifier::new("s0"));
        assert!(!events[1].is_arrival && events[1].stop_id == StopIdentifier::new("s0"));
        assert!(events[2].is_arrival && events[2].stop_id == StopIdentifier::new("s1"));
        assert!(!events[3].is_arrival && events[3].stop_id == StopIdentifier::new("s1"));

        // Interpolation: boundaries at 100m and 200m of a 50..250m span
        assert_eq!(events[0].time, 125);
        assert_eq!(events[2].time, 175);
        // Zero dwell for a drive-through
        assert_eq!(events[1].dwell_secs, Some(0));

        // s1 is mid-trip: its arrival gets no schedule time, its
        // departure does
        assert_eq!(events[2].scheduled_secs, None);
        assert_eq!(events[3].scheduled_secs, Some(300));
    }

    #[test]
    fn test_final_stop_arrival_has_schedule_time() {
        let block = test_block();
        let mut last_arrival = None;
        let prev = match_at(560, 2, 50.0, false);
        let current = match_at(590, 2, 95.0, true);

        let events = derive_events(&block, Some(&prev), &current, &mut last_arrival, 0);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_arrival);
        assert_eq!(events[0].scheduled_secs, Some(600));
    }

    #[test]
    fn test_backwards_match_produces_nothing() {
        let block = test_block();
        let mut last_arrival = None;
        let prev = match_at(100, 1, 10.0, false);
        let current = match_at(110, 0, 90.0, false);

        let events = derive_events(&block, Some(&prev), &current, &mut last_arrival, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_with_time_round_trip() {
        let block = test_block();
        let mut last_arrival = Some((StopIdentifier::new("s0"), 120));
        let prev = match_at(140, 0, 95.0, true);
        let current = match_at(160, 1, 40.0, false);
        let departure =
            derive_events(&block, Some(&prev), &current, &mut last_arrival, 0)[0].clone();

        let moved = departure.with_time(999);
        assert_eq!(moved.time, 999);
        assert_eq!(moved.stop_id, departure.stop_id);
        assert_eq!(moved.vehicle_id, departure.vehicle_id);
        assert_eq!(moved.is_arrival, departure.is_arrival);
        assert_eq!(moved.scheduled_secs, departure.scheduled_secs);
        assert_eq!(moved.dwell_secs, departure.dwell_secs);
        assert_eq!(moved.stop_path_index, departure.stop_path_index);
        assert_eq!(moved.trip_id, departure.trip_id);
        assert_eq!(moved.route_id, departure.route_id);
        assert_eq!(moved.block_id, departure.block_id);
    }

    #[test]
    fn test_key_identity() {
        let block = test_block();
        let mut last_arrival = None;
        let current = match_at(120, 0, 95.0, true);
        let event = derive_events(&block, None, &current, &mut last_arrival, 0)[0].clone();

        assert_eq!(event.key(), event.clone().key());
        assert_ne!(event.key(), event.with_time(121).key());
    }
}
