//! Per-vehicle tracking state.

use std::collections::VecDeque;

use crate::avl::AvlReport;
use crate::config::ConfigRevision;
use crate::identifiers::*;
use crate::matcher::{SpatialMatch, TemporalMatch};

/// A completed match, summarized for history and event generation.
#[derive(Clone, Debug)]
pub struct Match {
    pub vehicle_id: VehicleIdentifier,
    /// Epoch seconds of the report that produced the match.
    pub time: i64,
    pub block_id: BlockIdentifier,
    pub trip_id: TripIdentifier,
    pub route_id: RouteIdentifier,
    pub spatial: SpatialMatch,
    pub temporal: TemporalMatch,
}

/// Mutable record for one actively-tracked vehicle.
///
/// Created on first valid assignment, updated by the single logical
/// matching step for the vehicle (fixes for one vehicle are never
/// processed concurrently), and discarded when the vehicle goes
/// unpredictable or unassigned.
#[derive(Clone, Debug)]
pub struct VehicleState {
    pub vehicle_id: VehicleIdentifier,
    pub block_id: Option<BlockIdentifier>,
    pub revision: Option<ConfigRevision>,
    pub last_report: Option<AvlReport>,
    pub predictable: bool,
    /// Epoch seconds of the last arrival, per stop, for dwell times.
    pub last_arrival: Option<(StopIdentifier, i64)>,
    history: VecDeque<Match>,
}

impl VehicleState {
    pub fn new(vehicle_id: VehicleIdentifier) -> Self {
        Self {
            vehicle_id,
            block_id: None,
            revision: None,
            last_report: None,
            predictable: false,
            last_arrival: None,
            history: VecDeque::new(),
        }
    }

    pub fn assign(&mut self, block_id: BlockIdentifier, revision: ConfigRevision) {
        if self.block_id.as_ref() != Some(&block_id) {
            // New block: old progress no longer applies
            self.history.clear();
            self.last_arrival = None;
        }
        self.block_id = Some(block_id);
        self.revision = Some(revision);
    }

    pub fn record_match(&mut self, m: Match, history_depth: usize) {
        self.history.push_back(m);
        while self.history.len() > history_depth {
            self.history.pop_front();
        }
        self.predictable = true;
    }

    /// The most recent match.
    pub fn current_match(&self) -> Option<&Match> {
        self.history.back()
    }

    /// The match before the current one, when both are for the same block.
    pub fn previous_match(&self) -> Option<&Match> {
        if self.history.len() < 2 {
            return None;
        }
        self.history.get(self.history.len() - 2)
    }

    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.history.iter()
    }

    /// Drop the assignment and all progress; the vehicle is no longer
    /// predictable until it matches again.
    pub fn make_unpredictable(&mut self) {
        self.predictable = false;
        self.block_id = None;
        self.revision = None;
        self.history.clear();
        self.last_arrival = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Location;

    fn sample_match(time: i64) -> Match {
        Match {
            vehicle_id: VehicleIdentifier::new("v1"),
            time,
            block_id: BlockIdentifier::new("b1"),
            trip_id: TripIdentifier::new("t1"),
            route_id: RouteIdentifier::new("r1"),
            spatial: SpatialMatch {
                trip_index: 0,
                stop_path_index: 0,
                segment_index: 0,
                distance_along_segment: 0.0,
                distance_along_path: 0.0,
                distance_from_segment: 1.0,
                at_stop: false,
            },
            temporal: TemporalMatch {
                scheduled_secs: None,
                adherence_secs: None,
                is_layover: false,
                is_wait_stop: false,
                is_delayed: false,
            },
        }
    }

    #[test]
    fn test_history_bounded() {
        let mut state = VehicleState::new(VehicleIdentifier::new("v1"));
        for t in 0..10 {
            state.record_match(sample_match(t), 3);
        }
        assert_eq!(state.matches().count(), 3);
        assert_eq!(state.current_match().unwrap().time, 9);
        assert_eq!(state.previous_match().unwrap().time, 8);
    }

    #[test]
    fn test_reassignment_clears_progress() {
        let mut state = VehicleState::new(VehicleIdentifier::new("v1"));
        state.assign(BlockIdentifier::new("b1"), ConfigRevision(1));
        state.record_match(sample_match(1), 5);
        state.last_arrival = Some((StopIdentifier::new("s1"), 1));

        // Same block: history survives
        state.assign(BlockIdentifier::new("b1"), ConfigRevision(1));
        assert_eq!(state.matches().count(), 1);

        // Different block: progress resets
        state.assign(BlockIdentifier::new("b2"), ConfigRevision(1));
        assert_eq!(state.matches().count(), 0);
        assert!(state.last_arrival.is_none());
    }

    #[test]
    fn test_unpredictable_resets() {
        let mut state = VehicleState::new(VehicleIdentifier::new("v1"));
        state.assign(BlockIdentifier::new("b1"), ConfigRevision(1));
        state.record_match(sample_match(1), 5);
        assert!(state.predictable);

        state.make_unpredictable();
        assert!(!state.predictable);
        assert!(state.block_id.is_none());
        assert!(state.current_match().is_none());
    }
}
