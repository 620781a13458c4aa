//! Stops, the geometry between consecutive stops, and trip patterns.

use std::hash::Hasher;
use std::sync::Arc;

use itertools::Itertools;
use twox_hash::XxHash64;

use crate::geometry::{Extent, Location, Vector};
use crate::identifiers::{PatternIdentifier, RouteIdentifier, StopIdentifier};
use crate::model::types::{EngineError, Result};

/// A boarding location.
#[derive(Clone, Debug)]
pub struct Stop {
    pub id: StopIdentifier,
    pub name: Arc<str>,
    pub location: Location,
    /// Overrides the fleet-wide stop radius when a stop needs a larger or
    /// smaller detection zone (e.g. a long bus bay).
    pub radius_m: Option<f64>,
}

impl Stop {
    pub fn new(id: StopIdentifier, name: impl AsRef<str>, location: Location) -> Self {
        Self {
            id,
            name: name.as_ref().into(),
            location,
            radius_m: None,
        }
    }
}

/// The route geometry leading up to one stop: an ordered run of segments
/// ending at the stop, plus the behavior flags for that stop.
///
/// Owned by exactly one [`TripPattern`].
#[derive(Clone, Debug)]
pub struct StopPath {
    stop_id: StopIdentifier,
    segments: Vec<Vector>,
    length: f64,
    pub is_layover_stop: bool,
    pub is_wait_stop: bool,
    pub is_schedule_adherence_stop: bool,
}

impl StopPath {
    /// Build a path from the shape points leading to `stop_id`. Needs at
    /// least two points; a stop a schedule references but no geometry
    /// reaches is configuration damage we refuse early.
    pub fn new(stop_id: StopIdentifier, shape_points: &[Location]) -> Result<Self> {
        if shape_points.len() < 2 {
            return Err(EngineError::InvalidData(format!(
                "Stop path for {} has {} shape point(s), need at least 2",
                stop_id,
                shape_points.len()
            )));
        }
        let segments: Vec<Vector> = shape_points
            .iter()
            .tuple_windows()
            .map(|(a, b)| Vector::new(*a, *b))
            .collect();
        let length = segments.iter().map(Vector::length).sum();
        Ok(Self {
            stop_id,
            segments,
            length,
            is_layover_stop: false,
            is_wait_stop: false,
            is_schedule_adherence_stop: false,
        })
    }

    pub fn with_layover(mut self, layover: bool) -> Self {
        self.is_layover_stop = layover;
        self
    }

    pub fn with_wait_stop(mut self, wait: bool) -> Self {
        self.is_wait_stop = wait;
        self
    }

    pub fn with_schedule_adherence(mut self, adherence: bool) -> Self {
        self.is_schedule_adherence_stop = adherence;
        self
    }

    pub fn stop_id(&self) -> &StopIdentifier {
        &self.stop_id
    }

    pub fn segments(&self) -> &[Vector] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&Vector> {
        self.segments.get(index)
    }

    /// Total length of the path in meters.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Distance from the start of the path to a point `along` meters into
    /// segment `segment_index`. `None` when the index is out of range;
    /// indices arrive from arithmetic over externally-sourced schedules
    /// and are not trusted.
    pub fn distance_along(&self, segment_index: usize, along: f64) -> Option<f64> {
        if segment_index >= self.segments.len() {
            return None;
        }
        let prior: f64 = self.segments[..segment_index]
            .iter()
            .map(Vector::length)
            .sum();
        Some(prior + along)
    }

    /// The stop location: the end of the last segment.
    pub fn end_location(&self) -> Location {
        // Constructor guarantees at least one segment
        self.segments[self.segments.len() - 1].l2
    }
}

/// The ordered stop paths shared by every trip following the same shape
/// and stop sequence.
///
/// Identity is a hash of the shape id and stop sequence, so reprocessing
/// the same upstream data yields the same pattern id.
#[derive(Clone, Debug)]
pub struct TripPattern {
    id: PatternIdentifier,
    route_id: RouteIdentifier,
    stop_paths: Vec<StopPath>,
    extent: Extent,
}

impl TripPattern {
    pub fn new(shape_id: &str, route_id: RouteIdentifier, stop_paths: Vec<StopPath>) -> Self {
        let id = Self::derive_id(shape_id, &stop_paths);
        let mut extent = Extent::new();
        for path in &stop_paths {
            for segment in path.segments() {
                extent.extend(&segment.l1);
                extent.extend(&segment.l2);
            }
        }
        Self {
            id,
            route_id,
            stop_paths,
            extent,
        }
    }

    // XxHash64 with a fixed seed keeps the id stable across processes and
    // releases, unlike the std hasher.
    fn derive_id(shape_id: &str, stop_paths: &[StopPath]) -> PatternIdentifier {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(shape_id.as_bytes());
        for path in stop_paths {
            hasher.write(path.stop_id().as_str().as_bytes());
        }
        PatternIdentifier::new(format!("{}_{:016x}", shape_id, hasher.finish()))
    }

    pub fn id(&self) -> &PatternIdentifier {
        &self.id
    }

    pub fn route_id(&self) -> &RouteIdentifier {
        &self.route_id
    }

    pub fn stop_paths(&self) -> &[StopPath] {
        &self.stop_paths
    }

    pub fn stop_path(&self, index: usize) -> Option<&StopPath> {
        self.stop_paths.get(index)
    }

    pub fn is_last_stop_path(&self, index: usize) -> bool {
        !self.stop_paths.is_empty() && index == self.stop_paths.len() - 1
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }
}
