//! Spatial and temporal matching of AVL reports.

pub mod spatial;
pub mod temporal;

pub use spatial::{best_match, distance_along_trip, SpatialMatch};
pub use temporal::{temporal_match, TemporalMatch};
