//! Shared schedule types and the crate error enum.

use crate::identifiers::*;

/// Seconds in one service day.
pub const SECONDS_PER_DAY: i32 = 86_400;

/// Scheduled arrival/departure at one stop, in seconds into the service
/// day.
///
/// Times may lie outside `[0, 86400)`: a trip leaving just before
/// midnight can carry negative times and one running past midnight can
/// exceed a day (e.g. 25:30:00 = 91800). At least one of the two times is
/// present for any stop the schedule actually uses; typically the last
/// stop has only an arrival and the others only a departure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleTime {
    pub arrival: Option<i32>,
    pub departure: Option<i32>,
}

impl ScheduleTime {
    pub fn new(arrival: Option<i32>, departure: Option<i32>) -> Self {
        Self { arrival, departure }
    }

    pub fn arrival_only(secs: i32) -> Self {
        Self {
            arrival: Some(secs),
            departure: None,
        }
    }

    pub fn departure_only(secs: i32) -> Self {
        Self {
            arrival: None,
            departure: Some(secs),
        }
    }

    /// The departure time when present, otherwise the arrival time.
    pub fn time(&self) -> Option<i32> {
        self.departure.or(self.arrival)
    }

    pub fn is_usable(&self) -> bool {
        self.arrival.is_some() || self.departure.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Block not found: {0}")]
    BlockNotFound(BlockIdentifier),

    #[error("Trip not found: {0}")]
    TripNotFound(TripIdentifier),

    #[error("Route not found: {0}")]
    RouteNotFound(RouteIdentifier),

    #[error("Stop not found: {0}")]
    StopNotFound(StopIdentifier),

    #[error("Trip index {index} out of range for block {block}")]
    TripIndexOutOfRange { block: BlockIdentifier, index: usize },

    #[error("Stop path index {index} out of range for trip {trip}")]
    StopPathIndexOutOfRange { trip: TripIdentifier, index: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration revision {revision} unavailable: {message}")]
    ConfigUnavailable { revision: i32, message: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_time_preference() {
        let both = ScheduleTime::new(Some(100), Some(130));
        assert_eq!(both.time(), Some(130));

        let arrival = ScheduleTime::arrival_only(100);
        assert_eq!(arrival.time(), Some(100));

        let neither = ScheduleTime::new(None, None);
        assert_eq!(neither.time(), None);
        assert!(!neither.is_usable());
    }
}
