//! Tunable matching parameters.

/// Fleet-wide matching knobs.
///
/// Every tolerance the matchers and event generators consult lives here
/// rather than in hard-coded constants, so agencies with unusual stop
/// spacing or GPS quality can tune without rebuilding.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatchingParams {
    /// How early before its start a block may be considered active.
    pub allowable_early_secs: i32,
    /// When non-negative, matching is only attempted this long into a
    /// block; negative disables the limit and the block stays matchable
    /// until its end.
    pub allowable_after_start_secs: i32,
    /// How early a vehicle may sit at a layover before the trip start.
    pub layover_early_secs: i32,
    /// How late past its end a trip is still considered for matching.
    pub allowable_late_secs: i32,
    /// Fleet-wide maximum distance from a segment for a match; routes can
    /// override it individually.
    pub max_distance_from_segment_m: f64,
    /// Within this distance of the end of a stop path a match counts as
    /// being at the stop.
    pub at_stop_tolerance_m: f64,
    /// Two segment distances closer than this are treated as a tie, and
    /// the earlier (stop path, segment) wins to keep progress monotonic.
    pub tie_break_epsilon_m: f64,
    /// A vehicle later than this is flagged delayed.
    pub delay_threshold_secs: i32,
    /// Reports faster than this are rejected as GPS noise.
    pub max_speed_mps: f64,
    /// Reports older than this are rejected.
    pub max_report_age_secs: i64,
    /// Clock skew tolerance before a report is rejected as from the
    /// future.
    pub max_report_future_secs: i64,
    /// Search radius for assigning vehicles that report without a block.
    pub auto_assign_radius_m: f64,
    /// Longest a holding recommendation may keep a vehicle at a stop.
    pub max_holding_secs: i64,
    /// Desired gap between vehicles, used for holding recommendations at
    /// wait stops. `None` disables holding generation.
    pub target_headway_secs: Option<i64>,
    /// Worker threads in the dispatcher.
    pub worker_count: usize,
    /// Recent matches retained per vehicle.
    pub history_depth: usize,
}

impl Default for MatchingParams {
    fn default() -> Self {
        Self {
            allowable_early_secs: 900,
            allowable_after_start_secs: -1,
            layover_early_secs: 1_200,
            allowable_late_secs: 3_600,
            max_distance_from_segment_m: 60.0,
            at_stop_tolerance_m: 15.0,
            tie_break_epsilon_m: 0.001,
            delay_threshold_secs: 900,
            max_speed_mps: 40.0,
            max_report_age_secs: 900,
            max_report_future_secs: 60,
            auto_assign_radius_m: 200.0,
            max_holding_secs: 180,
            target_headway_secs: None,
            worker_count: 4,
            history_depth: 10,
        }
    }
}
