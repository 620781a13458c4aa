//! Directed route-shape segments and point-to-segment projection.

use super::location::{Location, METERS_PER_DEGREE};

/// A directed segment between two locations.
///
/// All derived measures work in a planar frame where one degree of
/// latitude is [`METERS_PER_DEGREE`] meters and longitude is scaled by the
/// cosine of the segment's mean latitude. The error of this approximation
/// grows toward the poles and for very long segments; route shapes are
/// short enough that it stays well under GPS noise at mid-latitudes.
/// Never mutated after construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vector {
    pub l1: Location,
    pub l2: Location,
}

impl Vector {
    pub fn new(l1: Location, l2: Location) -> Self {
        Self { l1, l2 }
    }

    /// Cosine of the mean latitude, used to scale longitude degrees.
    fn lat_correction(&self) -> f64 {
        ((self.l1.lat + self.l2.lat) / 2.0).to_radians().cos()
    }

    /// Planar x/y components of the segment, in meters.
    fn components(&self) -> (f64, f64) {
        let x = (self.l2.lon - self.l1.lon) * METERS_PER_DEGREE * self.lat_correction();
        let y = (self.l2.lat - self.l1.lat) * METERS_PER_DEGREE;
        (x, y)
    }

    /// Planar offset of `loc` from the segment start, in meters.
    fn offset_of(&self, loc: &Location) -> (f64, f64) {
        let x = (loc.lon - self.l1.lon) * METERS_PER_DEGREE * self.lat_correction();
        let y = (loc.lat - self.l1.lat) * METERS_PER_DEGREE;
        (x, y)
    }

    /// Length of the segment in meters.
    pub fn length(&self) -> f64 {
        let (x, y) = self.components();
        x.hypot(y)
    }

    /// Compass heading of the segment in degrees, clockwise from north.
    pub fn heading(&self) -> f64 {
        let (x, y) = self.components();
        let degrees = x.atan2(y).to_degrees();
        (degrees + 360.0) % 360.0
    }

    /// Projects `loc` onto the infinite line through the segment, clamps
    /// the projection to `[0, length]`, and returns the distance from `l1`
    /// to the clamped projection point.
    ///
    /// This is the foundation of all spatial matching: it says how far
    /// along the segment a vehicle has progressed.
    pub fn match_distance_along(&self, loc: &Location) -> f64 {
        let (ax, ay) = self.components();
        let len_sq = ax * ax + ay * ay;
        if len_sq == 0.0 {
            // Segment is actually a point
            return 0.0;
        }
        let (px, py) = self.offset_of(loc);
        let t = (ax * px + ay * py) / len_sq;
        (t * len_sq.sqrt()).clamp(0.0, self.length())
    }

    /// Distance from `loc` to its clamped projection on the segment, in
    /// meters. This is the match-quality metric: it is the perpendicular
    /// distance when the projection lands inside the segment and the
    /// distance to the nearer endpoint otherwise.
    pub fn distance(&self, loc: &Location) -> f64 {
        let along = self.match_distance_along(loc);
        let closest = self.location_at_length(along);
        let (px, py) = self.offset_of(loc);
        let (cx, cy) = self.offset_of(&closest);
        (px - cx).hypot(py - cy)
    }

    /// The location `length_along` meters from `l1` toward `l2`, clamped
    /// to the segment.
    pub fn location_at_length(&self, length_along: f64) -> Location {
        let len = self.length();
        if len == 0.0 {
            return self.l1;
        }
        let fraction = (length_along / len).clamp(0.0, 1.0);
        Location::new(
            self.l1.lat + (self.l2.lat - self.l1.lat) * fraction,
            self.l1.lon + (self.l2.lon - self.l1.lon) * fraction,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // One degree of longitude at the equator is one degree of latitude.
    fn meridian_segment() -> Vector {
        Vector::new(Location::new(0.0, 0.0), Location::new(0.01, 0.0))
    }

    #[test]
    fn test_length_meridian() {
        // 0.01 degrees of latitude is about 1,113 meters
        let v = meridian_segment();
        assert_relative_eq!(v.length(), 0.01 * METERS_PER_DEGREE, max_relative = 1e-9);
    }

    #[test]
    fn test_length_latitude_correction() {
        // At 60 degrees north a degree of longitude is half as wide
        let v = Vector::new(Location::new(60.0, 0.0), Location::new(60.0, 0.01));
        let expected = 0.01 * METERS_PER_DEGREE * 60.0_f64.to_radians().cos();
        assert_relative_eq!(v.length(), expected, max_relative = 1e-6);
    }

    #[test]
    fn test_heading() {
        let north = meridian_segment();
        assert_relative_eq!(north.heading(), 0.0, epsilon = 1e-6);

        let east = Vector::new(Location::new(0.0, 0.0), Location::new(0.0, 0.01));
        assert_relative_eq!(east.heading(), 90.0, epsilon = 1e-6);

        let south = Vector::new(Location::new(0.01, 0.0), Location::new(0.0, 0.0));
        assert_relative_eq!(south.heading(), 180.0, epsilon = 1e-6);
    }

    #[test]
    fn test_match_distance_along_clamps() {
        let v = meridian_segment();

        // Beside the midpoint: projection lands halfway along
        let mid = Location::new(0.005, 0.001);
        assert_relative_eq!(
            v.match_distance_along(&mid),
            v.length() / 2.0,
            max_relative = 1e-6
        );

        // Before the start: clamped to 0
        let before = Location::new(-0.01, 0.0);
        assert_relative_eq!(v.match_distance_along(&before), 0.0);

        // Past the end: clamped to the length
        let past = Location::new(0.02, 0.0);
        assert_relative_eq!(v.match_distance_along(&past), v.length());
    }

    #[test]
    fn test_distance_nonnegative_and_zero_on_segment() {
        let v = meridian_segment();

        // A point on the segment has distance zero
        let on = v.location_at_length(v.length() * 0.3);
        assert!(v.distance(&on) < 1e-6);

        // Points off the segment have strictly positive distance
        for loc in [
            Location::new(0.005, 0.001),
            Location::new(-0.01, 0.0),
            Location::new(0.02, 0.003),
        ] {
            assert!(v.distance(&loc) > 0.0);
        }
    }

    #[test]
    fn test_distance_perpendicular() {
        let v = meridian_segment();
        // 0.001 degrees of longitude at the equator, perpendicular offset
        let loc = Location::new(0.005, 0.001);
        assert_relative_eq!(
            v.distance(&loc),
            0.001 * METERS_PER_DEGREE,
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_distance_endpoint_when_projection_clamped() {
        let v = meridian_segment();
        // Behind the start, the distance is to the l1 endpoint
        let loc = Location::new(-0.001, 0.0);
        assert_relative_eq!(
            v.distance(&loc),
            0.001 * METERS_PER_DEGREE,
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_degenerate_segment() {
        let p = Location::new(10.0, 20.0);
        let v = Vector::new(p, p);
        assert_eq!(v.length(), 0.0);
        assert_eq!(v.match_distance_along(&Location::new(10.1, 20.0)), 0.0);
        assert_eq!(v.location_at_length(5.0), p);
    }
}
