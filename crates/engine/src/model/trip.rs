//! Scheduled and frequency-based trips.

use std::sync::Arc;

use crate::identifiers::{RouteIdentifier, TripIdentifier};
use crate::model::stop_path::TripPattern;
use crate::model::types::{EngineError, Result, ScheduleTime};

/// How a trip's times are defined.
#[derive(Clone, Debug)]
pub enum TripSchedule {
    /// A fixed timetable: one entry per stop path of the pattern.
    Fixed { times: Vec<ScheduleTime> },
    /// Frequency-based service. `base` is the profile of the first
    /// departure; with `exact_times` the nth run is the profile shifted
    /// by `n * headway_secs` and adherence is measured against that
    /// synthetic schedule. Without `exact_times` no schedule exists and
    /// only position and vehicle-to-vehicle headway are meaningful.
    Frequency {
        base: Vec<ScheduleTime>,
        headway_secs: u32,
        exact_times: bool,
    },
}

impl TripSchedule {
    pub fn times(&self) -> &[ScheduleTime] {
        match self {
            TripSchedule::Fixed { times } => times,
            TripSchedule::Frequency { base, .. } => base,
        }
    }
}

/// One run of a vehicle along a trip pattern.
///
/// `start_time`/`end_time` are seconds into the service day and may lie
/// outside `[0, 86400)` for runs that begin before or end after midnight.
#[derive(Clone, Debug)]
pub struct Trip {
    id: TripIdentifier,
    pattern: Arc<TripPattern>,
    start_time: i32,
    end_time: i32,
    schedule: TripSchedule,
    headsign: Arc<str>,
}

impl Trip {
    pub fn new(
        id: TripIdentifier,
        pattern: Arc<TripPattern>,
        start_time: i32,
        end_time: i32,
        schedule: TripSchedule,
    ) -> Result<Self> {
        if end_time < start_time {
            return Err(EngineError::InvalidData(format!(
                "Trip {} ends ({}) before it starts ({})",
                id, end_time, start_time
            )));
        }
        let times = schedule.times();
        if !times.is_empty() && times.len() != pattern.stop_paths().len() {
            return Err(EngineError::InvalidData(format!(
                "Trip {} has {} schedule times for {} stop paths",
                id,
                times.len(),
                pattern.stop_paths().len()
            )));
        }
        if let Some(bad) = times.iter().position(|t| !t.is_usable()) {
            return Err(EngineError::InvalidData(format!(
                "Trip {} schedule time {} has neither arrival nor departure",
                id, bad
            )));
        }
        Ok(Self {
            id,
            pattern,
            start_time,
            end_time,
            schedule,
            headsign: "".into(),
        })
    }

    pub fn with_headsign(mut self, headsign: impl AsRef<str>) -> Self {
        self.headsign = headsign.as_ref().into();
        self
    }

    pub fn id(&self) -> &TripIdentifier {
        &self.id
    }

    pub fn pattern(&self) -> &Arc<TripPattern> {
        &self.pattern
    }

    pub fn route_id(&self) -> &RouteIdentifier {
        self.pattern.route_id()
    }

    pub fn start_time(&self) -> i32 {
        self.start_time
    }

    pub fn end_time(&self) -> i32 {
        self.end_time
    }

    pub fn schedule(&self) -> &TripSchedule {
        &self.schedule
    }

    pub fn headsign(&self) -> &str {
        &self.headsign
    }

    pub fn is_frequency_based(&self) -> bool {
        matches!(self.schedule, TripSchedule::Frequency { .. })
    }

    /// Frequency trips with published exact-times headway carry a
    /// synthetic schedule; ones without have no schedule at all.
    pub fn has_schedule(&self) -> bool {
        match &self.schedule {
            TripSchedule::Fixed { times } => !times.is_empty(),
            TripSchedule::Frequency { exact_times, .. } => *exact_times,
        }
    }

    /// The schedule time for one stop path, `None` when the index is out
    /// of range or the trip carries no times.
    pub fn schedule_time(&self, stop_path_index: usize) -> Option<&ScheduleTime> {
        self.schedule.times().get(stop_path_index)
    }

    pub fn is_last_stop_path(&self, index: usize) -> bool {
        self.pattern.is_last_stop_path(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Location;
    use crate::identifiers::StopIdentifier;
    use crate::model::stop_path::StopPath;

    fn pattern(n_paths: usize) -> Arc<TripPattern> {
        let paths = (0..n_paths)
            .map(|i| {
                let base = i as f64 * 0.001;
                StopPath::new(
                    StopIdentifier::new(format!("s{}", i)),
                    &[Location::new(base, 0.0), Location::new(base + 0.001, 0.0)],
                )
                .unwrap()
            })
            .collect();
        Arc::new(TripPattern::new("shape", RouteIdentifier::new("r1"), paths))
    }

    #[test]
    fn test_schedule_length_must_match_pattern() {
        let result = Trip::new(
            TripIdentifier::new("t1"),
            pattern(3),
            0,
            600,
            TripSchedule::Fixed {
                times: vec![ScheduleTime::departure_only(0)],
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let result = Trip::new(
            TripIdentifier::new("t1"),
            pattern(1),
            600,
            0,
            TripSchedule::Fixed { times: vec![] },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_has_schedule() {
        let fixed = Trip::new(
            TripIdentifier::new("t1"),
            pattern(2),
            0,
            600,
            TripSchedule::Fixed {
                times: vec![
                    ScheduleTime::departure_only(0),
                    ScheduleTime::arrival_only(600),
                ],
            },
        )
        .unwrap();
        assert!(fixed.has_schedule());
        assert!(!fixed.is_frequency_based());

        let headway_only = Trip::new(
            TripIdentifier::new("t2"),
            pattern(2),
            0,
            600,
            TripSchedule::Frequency {
                base: vec![],
                headway_secs: 300,
                exact_times: false,
            },
        )
        .unwrap();
        assert!(!headway_only.has_schedule());
        assert!(headway_only.is_frequency_based());
    }

    #[test]
    fn test_schedule_time_out_of_range_is_none() {
        let trip = Trip::new(
            TripIdentifier::new("t1"),
            pattern(2),
            0,
            600,
            TripSchedule::Fixed {
                times: vec![
                    ScheduleTime::departure_only(0),
                    ScheduleTime::arrival_only(600),
                ],
            },
        )
        .unwrap();
        assert!(trip.schedule_time(1).is_some());
        assert!(trip.schedule_time(2).is_none());
    }
}
