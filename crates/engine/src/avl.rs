//! AVL reports and their validation.

use crate::geometry::Location;
use crate::identifiers::{BlockIdentifier, VehicleIdentifier};
use crate::params::MatchingParams;

/// One GPS fix from a vehicle.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AvlReport {
    pub vehicle_id: VehicleIdentifier,
    /// Epoch seconds.
    pub time: i64,
    pub location: Location,
    pub speed_mps: Option<f64>,
    pub heading_degrees: Option<f64>,
    /// Block the feed says the vehicle is running, when it says anything.
    pub assignment: Option<BlockIdentifier>,
}

impl AvlReport {
    pub fn new(vehicle_id: VehicleIdentifier, time: i64, location: Location) -> Self {
        Self {
            vehicle_id,
            time,
            location,
            speed_mps: None,
            heading_degrees: None,
            assignment: None,
        }
    }

    pub fn with_assignment(mut self, block: BlockIdentifier) -> Self {
        self.assignment = Some(block);
        self
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    pub fn with_heading(mut self, heading_degrees: f64) -> Self {
        self.heading_degrees = Some(heading_degrees);
        self
    }

    /// Reject bad fixes before they reach the matcher. `now` is the
    /// injected clock's idea of the current epoch second.
    pub fn validate(
        &self,
        now: i64,
        params: &MatchingParams,
    ) -> Result<(), AvlValidationError> {
        if !self.location.is_valid() {
            return Err(AvlValidationError::InvalidLocation {
                lat: self.location.lat,
                lon: self.location.lon,
            });
        }
        if let Some(speed) = self.speed_mps {
            if !speed.is_finite() || speed < 0.0 || speed > params.max_speed_mps {
                return Err(AvlValidationError::SpeedOutOfRange(speed));
            }
        }
        if let Some(heading) = self.heading_degrees {
            if !heading.is_finite() || !(0.0..360.0).contains(&heading) {
                return Err(AvlValidationError::HeadingOutOfRange(heading));
            }
        }
        if self.time < now - params.max_report_age_secs {
            return Err(AvlValidationError::StaleReport {
                age_secs: now - self.time,
            });
        }
        if self.time > now + params.max_report_future_secs {
            return Err(AvlValidationError::FutureReport {
                ahead_secs: self.time - now,
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AvlValidationError {
    #[error("Invalid coordinates ({lat}, {lon})")]
    InvalidLocation { lat: f64, lon: f64 },

    #[error("Speed {0} m/s out of range")]
    SpeedOutOfRange(f64),

    #[error("Heading {0} degrees out of range")]
    HeadingOutOfRange(f64),

    #[error("Report {age_secs}s old")]
    StaleReport { age_secs: i64 },

    #[error("Report {ahead_secs}s in the future")]
    FutureReport { ahead_secs: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(time: i64) -> AvlReport {
        AvlReport::new(
            VehicleIdentifier::new("v1"),
            time,
            Location::new(45.0, -122.5),
        )
    }

    #[test]
    fn test_valid_report_passes() {
        let params = MatchingParams::default();
        assert!(report(1_000).validate(1_000, &params).is_ok());
    }

    #[test]
    fn test_bad_coordinates_rejected() {
        let params = MatchingParams::default();
        let mut r = report(1_000);
        r.location = Location::new(95.0, 0.0);
        assert!(matches!(
            r.validate(1_000, &params),
            Err(AvlValidationError::InvalidLocation { .. })
        ));
    }

    #[test]
    fn test_speed_and_heading_ranges() {
        let params = MatchingParams::default();
        let r = report(1_000).with_speed(80.0);
        assert!(matches!(
            r.validate(1_000, &params),
            Err(AvlValidationError::SpeedOutOfRange(_))
        ));

        let r = report(1_000).with_heading(360.0);
        assert!(matches!(
            r.validate(1_000, &params),
            Err(AvlValidationError::HeadingOutOfRange(_))
        ));

        let r = report(1_000).with_speed(12.0).with_heading(359.0);
        assert!(r.validate(1_000, &params).is_ok());
    }

    #[test]
    fn test_time_skew() {
        let params = MatchingParams::default();
        assert!(matches!(
            report(0).validate(10_000, &params),
            Err(AvlValidationError::StaleReport { .. })
        ));
        assert!(matches!(
            report(10_000).validate(0, &params),
            Err(AvlValidationError::FutureReport { .. })
        ));
    }
}
