//! Schedule adherence and vehicle-state classification.

use crate::matcher::spatial::SpatialMatch;
use crate::model::trip::{Trip, TripSchedule};
use crate::model::types::SECONDS_PER_DAY;
use crate::params::MatchingParams;

/// The schedule side of a match.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemporalMatch {
    /// The schedule time the comparison used, seconds into the service
    /// day. `None` when the trip carries no usable schedule here.
    pub scheduled_secs: Option<i32>,
    /// Scheduled minus actual: positive when the vehicle is early,
    /// negative when late. `None` when no schedule applies.
    pub adherence_secs: Option<i32>,
    pub is_layover: bool,
    pub is_wait_stop: bool,
    pub is_delayed: bool,
}

/// Combine a spatial match with the trip's schedule.
///
/// Fixed schedules compare against the stop's departure time, except at
/// the trip's final stop where the arrival time applies. Exact-times
/// frequency trips compare against the synthetic run `base + n * headway`
/// closest to the actual time. Headway-only trips produce no adherence.
pub fn temporal_match(
    trip: &Trip,
    spatial: &SpatialMatch,
    secs_into_day: i32,
    params: &MatchingParams,
) -> TemporalMatch {
    let (is_layover, is_wait_stop) = match trip.pattern().stop_path(spatial.stop_path_index) {
        Some(path) => (
            spatial.at_stop && path.is_layover_stop,
            spatial.at_stop && path.is_wait_stop,
        ),
        None => (false, false),
    };

    let scheduled = scheduled_secs_for(trip, spatial.stop_path_index, secs_into_day);
    let adherence = scheduled.map(|sched| {
        let actual = closest_day_probe(sched, secs_into_day);
        sched - actual
    });
    let is_delayed = adherence.is_some_and(|a| a < -params.delay_threshold_secs);

    TemporalMatch {
        scheduled_secs: scheduled,
        adherence_secs: adherence,
        is_layover,
        is_wait_stop,
        is_delayed,
    }
}

/// The schedule time applicable at a stop path, shifted to the closest
/// synthetic run for exact-times frequency trips.
fn scheduled_secs_for(trip: &Trip, stop_path_index: usize, secs_into_day: i32) -> Option<i32> {
    let entry = trip.schedule_time(stop_path_index)?;
    let applicable = if trip.is_last_stop_path(stop_path_index) && entry.arrival.is_some() {
        entry.arrival
    } else {
        entry.time()
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
            let actual = closest_day_probe(base, secs_into_day);
            let n = ((actual - base) as f64 / headway as f64).round().max(0.0) as i32;
            Some(base + n * headway)
        }
    }
}

/// Of the three day probes of `actual`, the one closest to `scheduled`.
/// Keeps adherence sane around midnight without tracking the day.
pub(crate) fn closest_day_probe(scheduled: i32, actual: i32) -> i32 {
    [actual, actual + SECONDS_PER_DAY, actual - SECONDS_PER_DAY]
        .into_iter()
        .min_by_key(|probe| (scheduled - probe).abs())
        .unwrap_or(actual)
}
