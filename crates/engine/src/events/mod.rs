//! Event records derived from match sequences, and their delivery.

pub mod arrival_departure;
pub mod headway;
pub mod holding;
pub mod sink;

pub use arrival_departure::{ArrivalDeparture, ArrivalDepartureKey};
pub use headway::{Headway, HeadwayKey, HeadwayTracker};
pub use holding::{HoldingTime, HoldingTimeKey};
pub use sink::{CollectingSink, EventSink, NullSink, VehicleEvent, VehicleEventKind};
