//! Headways between consecutive vehicles at a stop.

use std::collections::HashMap;

use crate::identifiers::{RouteIdentifier, StopIdentifier, VehicleIdentifier};

/// The gap between two vehicles' departures from the same stop on the
/// same route, with the rolling statistics of that stop at creation
/// time. Write-once.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Headway {
    pub vehicle_id: VehicleIdentifier,
    pub leading_vehicle_id: VehicleIdentifier,
    pub route_id: RouteIdentifier,
    pub stop_id: StopIdentifier,
    /// Epoch seconds when the headway was measured.
    pub creation_time: i64,
    pub headway_secs: i64,
    pub average_secs: f64,
    pub variance: f64,
    pub coefficient_of_variation: f64,
}

/// Identity of a [`Headway`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HeadwayKey {
    pub vehicle_id: VehicleIdentifier,
    pub creation_time: i64,
}

impl Headway {
    pub fn key(&self) -> HeadwayKey {
        HeadwayKey {
            vehicle_id: self.vehicle_id.clone(),
            creation_time: self.creation_time,
        }
    }
}

// Welford's online update; never recomputes from history.
#[derive(Clone, Debug, Default)]
struct RollingStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RollingStats {
    fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            self.variance().sqrt() / self.mean
        }
    }
}

#[derive(Clone, Debug, Default)]
struct StopRecord {
    last_departure: Option<(VehicleIdentifier, i64)>,
    stats: RollingStats,
}

/// Tracks the most recent departure per (route, stop) and produces a
/// [`Headway`] whenever a different vehicle departs next.
#[derive(Default)]
pub struct HeadwayTracker {
    stops: HashMap<(RouteIdentifier, StopIdentifier), StopRecord>,
}

impl HeadwayTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent departure recorded at a stop, if any.
    pub fn last_departure(
        &self,
        route_id: &RouteIdentifier,
        stop_id: &StopIdentifier,
    ) -> Option<(VehicleIdentifier, i64)> {
        self.stops
            .get(&(route_id.clone(), stop_id.clone()))
            .and_then(|record| record.last_departure.clone())
    }

    /// Record a departure. The first departure at a stop, and repeated
    /// departures by the same vehicle (GPS jitter around the stop),
    /// measure nothing.
    pub fn record_departure(
        &mut self,
        route_id: &RouteIdentifier,
        stop_id: &StopIdentifier,
        vehicle_id: &VehicleIdentifier,
        time: i64,
    ) -> Option<Headway> {
        let record = self
            .stops
            .entry((route_id.clone(), stop_id.clone()))
            .or_default();

        let previous = record.last_departure.replace((vehicle_id.clone(), time));
        let (leading_vehicle, leading_time) = previous?;
        if &leading_vehicle == vehicle_id {
            return None;
        }

        let headway_secs = time - leading_time;
        if headway_secs < 0 {
            return None;
        }
        record.stats.add(headway_secs as f64);

        Some(Headway {
            vehicle_id: vehicle_id.clone(),
            leading_vehicle_id: leading_vehicle,
            route_id: route_id.clone(),
            stop_id: stop_id.clone(),
            creation_time: time,
            headway_secs,
            average_secs: record.stats.mean,
            variance: record.stats.variance(),
            coefficient_of_variation: record.stats.coefficient_of_variation(),
        })
    }
}
