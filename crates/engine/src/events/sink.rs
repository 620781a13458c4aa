//! Event delivery to external storage.

use std::sync::{Mutex, PoisonError};

use crate::identifiers::VehicleIdentifier;

use super::arrival_departure::ArrivalDeparture;
use super::headway::Headway;
use super::holding::HoldingTime;

/// Diagnostic happenings worth recording even though they are not
/// matches: rejected reports, lost assignments, and the like.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleEvent {
    pub vehicle_id: VehicleIdentifier,
    /// Epoch seconds.
    pub time: i64,
    pub kind: VehicleEventKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleEventKind {
    ReportRejected,
    NoMatch,
    Assigned,
    AssignmentLost,
}

/// Where the engine sends everything it derives.
///
/// Calls are fire-and-forget: implementations own durability, batching,
/// and retries, and must never block the matcher for long.
pub trait EventSink: Send + Sync {
    fn arrival_departure(&self, event: ArrivalDeparture);
    fn headway(&self, event: Headway);
    fn holding_time(&self, event: HoldingTime);
    fn vehicle_event(&self, event: VehicleEvent);
}

/// Discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn arrival_departure(&self, _event: ArrivalDeparture) {}
    fn headway(&self, _event: Headway) {}
    fn holding_time(&self, _event: HoldingTime) {}
    fn vehicle_event(&self, _event: VehicleEvent) {}
}

/// Buffers everything in memory; handy in tests and for small tools.
#[derive(Default)]
pub struct CollectingSink {
    pub arrivals_departures: Mutex<Vec<ArrivalDeparture>>,
    pub headways: Mutex<Vec<Headway>>,
    pub holding_times: Mutex<Vec<HoldingTime>>,
    pub vehicle_events: Mutex<Vec<VehicleEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for CollectingSink {
    fn arrival_departure(&self, event: ArrivalDeparture) {
        self.arrivals_departures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn headway(&self, event: Headway) {
        self.headways
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn holding_time(&self, event: HoldingTime) {
        self.holding_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn vehicle_event(&self, event: VehicleEvent) {
        self.vehicle_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
