//! Bounding rectangles over route geometry.

use rstar::AABB;

use super::location::{Location, METERS_PER_DEGREE};

/// Accumulated bounding rectangle of a set of locations.
///
/// Built once per trip pattern by folding in every shape point, then used
/// as a cheap pre-filter before per-segment matching. Once non-empty the
/// minimums never exceed the maximums on either axis.
#[derive(Clone, Copy, Debug)]
pub struct Extent {
    min_lat: f64,
    min_lon: f64,
    max_lat: f64,
    max_lon: f64,
}

impl Extent {
    pub fn new() -> Self {
        Self {
            min_lat: f64::INFINITY,
            min_lon: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            max_lon: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_lat > self.max_lat
    }

    pub fn extend(&mut self, loc: &Location) {
        self.min_lat = self.min_lat.min(loc.lat);
        self.max_lat = self.max_lat.max(loc.lat);
        self.min_lon = self.min_lon.min(loc.lon);
        self.max_lon = self.max_lon.max(loc.lon);
    }

    pub fn extend_extent(&mut self, other: &Extent) {
        if other.is_empty() {
            return;
        }
        self.min_lat = self.min_lat.min(other.min_lat);
        self.max_lat = self.max_lat.max(other.max_lat);
        self.min_lon = self.min_lon.min(other.min_lon);
        self.max_lon = self.max_lon.max(other.max_lon);
    }

    /// Conservative test of whether `loc` lies within `distance` meters of
    /// the rectangle.
    ///
    /// Checks the latitude band first, then the longitude band with a
    /// cosine correction for the rectangle's mean latitude. May return
    /// true for points slightly beyond `distance` (the bands overestimate
    /// near corners); never returns false for a point actually within it.
    pub fn is_within_distance(&self, loc: &Location, distance: f64) -> bool {
        if self.is_empty() {
            return false;
        }

        let lat_margin = distance / METERS_PER_DEGREE;
        if loc.lat < self.min_lat - lat_margin || loc.lat > self.max_lat + lat_margin {
            return false;
        }

        let mean_lat = (self.min_lat + self.max_lat) / 2.0;
        let lon_margin = distance / (METERS_PER_DEGREE * mean_lat.to_radians().cos());
        loc.lon >= self.min_lon - lon_margin && loc.lon <= self.max_lon + lon_margin
    }

    /// Envelope in `[lon, lat]` axis order for the pattern R-tree.
    pub fn to_aabb(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_lon, self.min_lat], [self.max_lon, self.max_lat])
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::new()
    }
}
