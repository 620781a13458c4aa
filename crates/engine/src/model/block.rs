//! Vehicle blocks and the time windows in which their trips may match.

use std::sync::Arc;

use tracing::debug;

use crate::identifiers::{BlockIdentifier, ServiceIdentifier, TripIdentifier};
use crate::model::calendar::{DayOffset, ServiceContext};
use crate::model::trip::Trip;

/// A vehicle's assignment for one service day: an ordered sequence of
/// trips under one service id.
///
/// All eligibility questions are answered by probing the fix's
/// seconds-into-day value three ways (as supplied, plus one day, minus
/// one day), with each probe gated on whether the block's service runs
/// on the corresponding day. That is how trips crossing midnight match
/// without any persisted day state.
#[derive(Clone, Debug)]
pub struct Block {
    id: BlockIdentifier,
    service_id: ServiceIdentifier,
    trips: Vec<Arc<Trip>>,
}

impl Block {
    pub fn new(
        id: BlockIdentifier,
        service_id: ServiceIdentifier,
        trips: Vec<Arc<Trip>>,
    ) -> Self {
        Self {
            id,
            service_id,
            trips,
        }
    }

    pub fn id(&self) -> &BlockIdentifier {
        &self.id
    }

    pub fn service_id(&self) -> &ServiceIdentifier {
        &self.service_id
    }

    pub fn trips(&self) -> &[Arc<Trip>] {
        &self.trips
    }

    pub fn trip(&self, index: usize) -> Option<&Arc<Trip>> {
        self.trips.get(index)
    }

    pub fn trip_index_of(&self, trip_id: &TripIdentifier) -> Option<usize> {
        self.trips.iter().position(|t| t.id() == trip_id)
    }

    /// Start of the first trip, seconds into the service day.
    pub fn start_time(&self) -> Option<i32> {
        self.trips.first().map(|t| t.start_time())
    }

    /// End of the last trip, seconds into the service day.
    pub fn end_time(&self) -> Option<i32> {
        self.trips.last().map(|t| t.end_time())
    }

    /// Index of the first trip that starts more than `tolerance_secs`
    /// before the previous trip ended. Trips are expected contiguous;
    /// overlap beyond the tolerance is schedule damage worth surfacing.
    pub fn first_overlapping_trip(&self, tolerance_secs: i32) -> Option<usize> {
        self.trips
            .windows(2)
            .position(|pair| pair[1].start_time() < pair[0].end_time() - tolerance_secs)
            .map(|position| position + 1)
    }

    /// Whether any of the three day probes for `secs_into_day` lands in
    /// the block's window, with each probe gated on the service running
    /// that day.
    ///
    /// The window is `[start - before_secs, end]`, except when
    /// `after_start_secs >= 0`: then matching is only attempted for the
    /// first `after_start_secs` seconds of the block, giving
    /// `[start - before_secs, start + after_start_secs]`. The end of the
    /// window gets no leniency either way.
    pub fn is_active(
        &self,
        secs_into_day: i32,
        before_secs: i32,
        after_start_secs: i32,
        services: &ServiceContext,
    ) -> bool {
        let (Some(start), Some(end)) = (self.start_time(), self.end_time()) else {
            // A block without trips can never be active
            return false;
        };
        let lower = start - before_secs;
        let upper = if after_start_secs >= 0 {
            start + after_start_secs
        } else {
            end
        };

        for day in DayOffset::ALL {
            if !services.is_valid(day, &self.service_id) {
                continue;
            }
            let probe = secs_into_day + day.probe_seconds();
            if probe >= lower && probe <= upper {
                debug!(block = %self.id, ?day, probe, "block active");
                return true;
            }
        }
        false
    }

    /// The index of the trip the block should currently be running.
    ///
    /// A trip is current from the end of the previous trip until its own
    /// end; the first trip starts at its own start time. Probes at all
    /// three day offsets. When no interval contains the time but it falls
    /// in the before-start leniency window, the vehicle is early for its
    /// first trip and index 0 is returned.
    pub fn trip_index_at(&self, secs_into_day: i32, allowable_before_secs: i32) -> Option<usize> {
        let start = self.start_time()?;

        for day in DayOffset::ALL {
            let probe = secs_into_day + day.probe_seconds();
            let mut lower = start;
            for (index, trip) in self.trips.iter().enumerate() {
                if probe >= lower && probe <= trip.end_time() {
                    return Some(index);
                }
                lower = trip.end_time();
            }
        }

        // Early for the first trip, within the leniency window
        for day in DayOffset::ALL {
            let probe = secs_into_day + day.probe_seconds();
            if probe >= start - allowable_before_secs && probe < start {
                return Some(0);
            }
        }

        None
    }

    /// Every trip whose own window `[start - early_secs, end + late_secs]`
    /// contains the time at any gated day probe. More than one trip can
    /// qualify, e.g. overlapping loop trips around a layover.
    pub fn trips_active_at(
        &self,
        secs_into_day: i32,
        early_secs: i32,
        late_secs: i32,
        services: &ServiceContext,
    ) -> Vec<usize> {
        let mut active = Vec::new();
        for (index, trip) in self.trips.iter().enumerate() {
            let lower = trip.start_time() - early_secs;
            let upper = trip.end_time() + late_secs;
            let hit = DayOffset::ALL.iter().any(|day| {
                if !services.is_valid(*day, &self.service_id) {
                    return false;
                }
                let probe = secs_into_day + day.probe_seconds();
                probe >= lower && probe <= upper
            });
            if hit {
                active.push(index);
            }
        }
        active
    }
}
