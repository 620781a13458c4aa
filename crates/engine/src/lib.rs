//! # headsign-engine
//!
//! Realtime matching of fleet GPS reports against transit schedules.
//!
//! ## Features
//!
//! - **Route geometry**: segment projection, bounding extents, and
//!   distance-along-path arithmetic
//! - **Activity windows**: which trips of a block may legally match a
//!   clock time, including trips crossing midnight
//! - **Spatial + temporal matching**: closest-segment projection and
//!   schedule adherence, for fixed and frequency-based timetables
//! - **Event derivation**: arrivals, departures, dwell times, headways,
//!   and holding recommendations
//! - **Concurrency-safe config**: immutable per-revision snapshots behind
//!   a lazily-populated cache with bounded reconnect-and-retry
//!
//! ## Example
//!
//! ```
//! use headsign_engine::prelude::*;
//! use std::sync::Arc;
//!
//! // Geometry: a 100m straight stop path
//! let path = StopPath::new(
//!     StopIdentifier::new("main_st"),
//!     &[Location::new(45.0, -122.5), Location::new(45.0009, -122.5)],
//! )
//! .unwrap();
//! let pattern = Arc::new(TripPattern::new(
//!     "shape_1",
//!     RouteIdentifier::new("route_9"),
//!     vec![path],
//! ));
//!
//! // One trip from 08:00 to 08:10
//! let trip = Trip::new(
//!     TripIdentifier::new("run_1"),
//!     pattern,
//!     28_800,
//!     29_400,
//!     TripSchedule::Fixed {
//!         times: vec![ScheduleTime::arrival_only(29_400)],
//!     },
//! )
//! .unwrap();
//! let block = Block::new(
//!     BlockIdentifier::new("block_9"),
//!     ServiceIdentifier::new("weekday"),
//!     vec![Arc::new(trip)],
//! );
//!
//! // The block is active at 08:05 when its service runs today
//! let services = ServiceContext::always(ServiceIdentifier::new("weekday"));
//! assert!(block.is_active(29_100, 0, -1, &services));
//! ```

pub mod avl;
pub mod config;
pub mod engine;
pub mod events;
pub mod geometry;
pub mod identifiers;
pub mod matcher;
pub mod model;
pub mod params;
pub mod vehicle;

// Re-exports for convenience
pub mod prelude {
    pub use crate::avl::{AvlReport, AvlValidationError};
    pub use crate::config::{BlockSource, ConfigCache, ConfigData, ConfigRevision, RouteConfig, SourceError};
    pub use crate::engine::{
        Clock, FixedClock, MatchDispatcher, MatchOutcome, MatchingEngine, NoMatchReason,
        SystemClock,
    };
    pub use crate::events::{
        ArrivalDeparture, CollectingSink, EventSink, Headway, HeadwayTracker, HoldingTime,
        NullSink, VehicleEvent, VehicleEventKind,
    };
    pub use crate::geometry::{Extent, Location, Vector};
    pub use crate::identifiers::*;
    pub use crate::matcher::{SpatialMatch, TemporalMatch};
    pub use crate::model::{
        Block, DayOffset, EngineError, Route, RouteOrdering, ScheduleTime, ServiceCalendar,
        ServiceContext, Stop, StopPath, Trip, TripPattern, TripSchedule, WeekdayFlags,
    };
    pub use crate::params::MatchingParams;
    pub use crate::vehicle::{Match, VehicleState};
}

pub use prelude::*;
