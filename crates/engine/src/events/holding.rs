//! Holding-time recommendations for headway regulation.

use crate::identifiers::{StopIdentifier, TripIdentifier, VehicleIdentifier};

/// A recommendation to hold a vehicle at a stop until `holding_time`.
///
/// Pure data plus decision functions; actually holding the vehicle is the
/// dispatcher's problem. Write-once.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HoldingTime {
    pub vehicle_id: VehicleIdentifier,
    pub stop_id: StopIdentifier,
    pub trip_id: TripIdentifier,
    /// Epoch seconds the vehicle arrived at the stop.
    pub arrival_time: i64,
    /// Epoch seconds before which the vehicle should not depart.
    pub holding_time: i64,
    /// Epoch seconds the recommendation was created.
    pub creation_time: i64,
}

/// Identity of a [`HoldingTime`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HoldingTimeKey {
    pub vehicle_id: VehicleIdentifier,
    pub creation_time: i64,
}

impl HoldingTime {
    pub fn key(&self) -> HoldingTimeKey {
        HoldingTimeKey {
            vehicle_id: self.vehicle_id.clone(),
            creation_time: self.creation_time,
        }
    }

    /// Whether the vehicle is free to go at `now`.
    pub fn leave_stop(&self, now: i64) -> bool {
        now >= self.holding_time
    }

    /// The earliest departure time from `now`'s point of view: `now`
    /// itself once the hold has expired.
    pub fn time_to_leave(&self, now: i64) -> i64 {
        now.max(self.holding_time)
    }
}

/// Derive a holding recommendation for a vehicle that arrived at a
/// regulated stop.
///
/// The vehicle is held long enough to stretch the gap behind its leader
/// toward `target_headway_secs`, but never past `max_holding_secs` after
/// arrival, and never released before its scheduled departure when one
/// applies.
pub fn recommend(
    vehicle_id: VehicleIdentifier,
    stop_id: StopIdentifier,
    trip_id: TripIdentifier,
    arrival_time: i64,
    scheduled_departure: Option<i64>,
    leader_departure: Option<i64>,
    target_headway_secs: i64,
    max_holding_secs: i64,
) -> HoldingTime {
    let headway_based = leader_departure
        .map(|leader| leader + target_headway_secs)
        .unwrap_or(arrival_time);
    let wanted = headway_based.max(scheduled_departure.unwrap_or(arrival_time));
    let holding_time = wanted.clamp(arrival_time, arrival_time + max_holding_secs);

    HoldingTime {
        vehicle_id,
        stop_id,
        trip_id,
        arrival_time,
        holding_time,
        creation_time: arrival_time,
    }
}
