//! Immutable latitude/longitude pairs.

use geo::{HaversineDistance, Point};

/// Approximate meters per degree of latitude (and of longitude at the
/// equator). Longitude spans must be corrected by the cosine of the
/// latitude before using this constant.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// A point on the earth, in decimal degrees.
///
/// Owned by value everywhere; two locations are only as large as four
/// `f64`s so copying is cheaper than sharing.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn to_point(self) -> Point {
        Point::new(self.lon, self.lat)
    }

    /// Great-circle distance to another location, in meters.
    pub fn distance_to(&self, other: &Location) -> f64 {
        self.to_point().haversine_distance(&other.to_point())
    }

    /// True when both coordinates are finite and inside the valid
    /// latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl From<Location> for Point {
    fn from(loc: Location) -> Self {
        loc.to_point()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_distance() {
        // Distance from NYC to LA is approximately 3,936 km
        let nyc = Location::new(40.7128, -74.0060);
        let la = Location::new(34.0522, -118.2437);

        let dist = nyc.distance_to(&la);
        assert!((dist - 3_936_000.0).abs() < 50_000.0); // Within 50km
    }

    #[test]
    fn test_validity() {
        assert!(Location::new(40.0, -74.0).is_valid());
        assert!(!Location::new(91.0, 0.0).is_valid());
        assert!(!Location::new(0.0, 181.0).is_valid());
        assert!(!Location::new(f64::NAN, 0.0).is_valid());
    }
}
