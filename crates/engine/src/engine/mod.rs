//! The matching engine: validation, activity windows, spatial and
//! temporal matching, and event generation, wired together over the
//! config cache.

pub mod clock;
pub mod dispatch;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dispatch::MatchDispatcher;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::avl::AvlReport;
use crate::config::{ConfigCache, ConfigRevision, RouteConfig};
use crate::events::arrival_departure::derive_events;
use crate::events::{
    holding, ArrivalDeparture, EventSink, HeadwayTracker, VehicleEvent, VehicleEventKind,
};
use crate::identifiers::{BlockIdentifier, TripIdentifier, VehicleIdentifier};
use crate::matcher::{best_match, temporal_match, SpatialMatch};
use crate::model::{Block, Result, ServiceContext};
use crate::params::MatchingParams;
use crate::vehicle::{Match, VehicleState};

/// Result of matching one report.
#[derive(Clone, Debug)]
pub enum MatchOutcome {
    Matched(Match),
    NoMatch(NoMatchReason),
}

impl MatchOutcome {
    pub fn matched(&self) -> Option<&Match> {
        match self {
            MatchOutcome::Matched(m) => Some(m),
            MatchOutcome::NoMatch(_) => None,
        }
    }
}

/// Why a report produced no match. Callers decide what becomes of the
/// vehicle; the engine has already recorded a diagnostic event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoMatchReason {
    ReportRejected(String),
    OutOfOrderReport,
    ServiceDayNotSet,
    ConfigUnavailable(String),
    NoAssignment,
    BlockNotFound(BlockIdentifier),
    BlockNotActive,
    NoCandidateTrips,
    TooFarFromRoute,
}

#[derive(Clone)]
struct ServiceDay {
    start_epoch: i64,
    services: ServiceContext,
}

/// One engine per configuration revision.
///
/// Everything time-dependent is injected: the clock, the service day,
/// and the config cache. Vehicle states are serialized per vehicle by
/// the dispatcher; the engine itself only takes short map locks.
pub struct MatchingEngine {
    cache: Arc<ConfigCache>,
    revision: ConfigRevision,
    params: MatchingParams,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    day: Mutex<Option<ServiceDay>>,
    vehicles: RwLock<HashMap<VehicleIdentifier, VehicleState>>,
    headways: Mutex<HeadwayTracker>,
}

impl MatchingEngine {
    pub fn new(
        cache: Arc<ConfigCache>,
        revision: ConfigRevision,
        params: MatchingParams,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            cache,
            revision,
            params,
            clock,
            sink,
            day: Mutex::new(None),
            vehicles: RwLock::new(HashMap::new()),
            headways: Mutex::new(HeadwayTracker::new()),
        }
    }

    pub fn params(&self) -> &MatchingParams {
        &self.params
    }

    pub fn revision(&self) -> ConfigRevision {
        self.revision
    }

    /// Set the service day reports are matched against: its date (for
    /// calendar validity) and the epoch second the day's schedule starts.
    pub fn set_service_day(&self, date: NaiveDate, start_epoch: i64) -> Result<()> {
        let services = self.cache.service_context(date)?;
        info!(%date, start_epoch, "service day set");
        *lock(&self.day) = Some(ServiceDay {
            start_epoch,
            services,
        });
        Ok(())
    }

    /// Match one report, emit any derived events, and update the
    /// vehicle's state. Never panics on bad input: every failure mode is
    /// an explicit [`NoMatchReason`].
    pub fn match_report(&self, report: AvlReport) -> MatchOutcome {
        let now = self.clock.now();
        if let Err(e) = report.validate(now, &self.params) {
            warn!(vehicle = %report.vehicle_id, error = %e, "report rejected");
            self.sink.vehicle_event(VehicleEvent {
                vehicle_id: report.vehicle_id.clone(),
                time: report.time,
                kind: VehicleEventKind::ReportRejected,
                description: e.to_string(),
            });
            return MatchOutcome::NoMatch(NoMatchReason::ReportRejected(e.to_string()));
        }

        let Some(day) = lock(&self.day).clone() else {
            warn!("service day not set; dropping report");
            return MatchOutcome::NoMatch(NoMatchReason::ServiceDayNotSet);
        };

        let config = match self.cache.config(self.revision) {
            Ok(config) => config,
            Err(e) => {
                return MatchOutcome::NoMatch(NoMatchReason::ConfigUnavailable(e.to_string()));
            }
        };

        let mut state = self
            .vehicle_state(&report.vehicle_id)
            .unwrap_or_else(|| VehicleState::new(report.vehicle_id.clone()));

        // Per-vehicle report times are strictly increasing; late
        // arrivals are rejected rather than reordered
        if let Some(last) = &state.last_report {
            if report.time <= last.time {
                debug!(vehicle = %report.vehicle_id, "out of order report");
                self.sink.vehicle_event(VehicleEvent {
                    vehicle_id: report.vehicle_id.clone(),
                    time: report.time,
                    kind: VehicleEventKind::ReportRejected,
                    description: "out of order report".to_string(),
                });
                return MatchOutcome::NoMatch(NoMatchReason::OutOfOrderReport);
            }
        }

        let secs_into_day = (report.time - day.start_epoch) as i32;
        let outcome = self.match_against_config(&config, &day, secs_into_day, &report, &mut state);

        state.last_report = Some(report.clone());
        if let MatchOutcome::NoMatch(reason) = &outcome {
            self.report_no_match(&report, reason);
        }
        self.store_state(state);
        outcome
    }

    fn match_against_config(
        &self,
        config: &RouteConfig,
        day: &ServiceDay,
        secs_into_day: i32,
        report: &AvlReport,
        state: &mut VehicleState,
    ) -> MatchOutcome {
        let assigned = report.assignment.clone().or_else(|| state.block_id.clone());

        let (block, spatial) = match assigned {
            Some(block_id) => {
                let Some(block) = config.block(&block_id) else {
                    return MatchOutcome::NoMatch(NoMatchReason::BlockNotFound(block_id));
                };
                if !block.is_active(
                    secs_into_day,
                    self.params.allowable_early_secs,
                    self.params.allowable_after_start_secs,
                    &day.services,
                ) {
                    return MatchOutcome::NoMatch(NoMatchReason::BlockNotActive);
                }
                let candidates = block.trips_active_at(
                    secs_into_day,
                    self.params.layover_early_secs,
                    self.params.allowable_late_secs,
                    &day.services,
                );
                if candidates.is_empty() {
                    return MatchOutcome::NoMatch(NoMatchReason::NoCandidateTrips);
                }
                let Some(spatial) = best_match(
                    block,
                    &candidates,
                    &report.location,
                    config,
                    &self.params,
                ) else {
                    return MatchOutcome::NoMatch(NoMatchReason::TooFarFromRoute);
                };
                (block.clone(), spatial)
            }
            None => match self.auto_assign(config, day, secs_into_day, report) {
                Some(found) => found,
                None => return MatchOutcome::NoMatch(NoMatchReason::NoAssignment),
            },
        };

        let Some(trip) = block.trip(spatial.trip_index) else {
            // Candidate indices were just validated; treat a miss as no
            // candidates rather than panicking
            return MatchOutcome::NoMatch(NoMatchReason::NoCandidateTrips);
        };
        let temporal = temporal_match(trip, &spatial, secs_into_day, &self.params);

        let matched = Match {
            vehicle_id: report.vehicle_id.clone(),
            time: report.time,
            block_id: block.id().clone(),
            trip_id: trip.id().clone(),
            route_id: trip.route_id().clone(),
            spatial,
            temporal,
        };

        let newly_assigned = state.block_id.as_ref() != Some(block.id());
        state.assign(block.id().clone(), self.revision);
        if newly_assigned {
            self.sink.vehicle_event(VehicleEvent {
                vehicle_id: report.vehicle_id.clone(),
                time: report.time,
                kind: VehicleEventKind::Assigned,
                description: format!("assigned to block {}", block.id()),
            });
        }

        self.emit_stop_events(&block, state, &matched, day);
        state.record_match(matched.clone(), self.params.history_depth);

        MatchOutcome::Matched(matched)
    }

    /// Try blocks whose geometry is near an unassigned vehicle, keeping
    /// the spatially best active match.
    fn auto_assign(
        &self,
        config: &RouteConfig,
        day: &ServiceDay,
        secs_into_day: i32,
        report: &AvlReport,
    ) -> Option<(Arc<Block>, SpatialMatch)> {
        let mut best: Option<(Arc<Block>, SpatialMatch)> = None;
        for block in config.blocks_near(&report.location, self.params.auto_assign_radius_m) {
            if !block.is_active(
                secs_into_day,
                self.params.allowable_early_secs,
                self.params.allowable_after_start_secs,
                &day.services,
            ) {
                continue;
            }
            let candidates = block.trips_active_at(
                secs_into_day,
                self.params.layover_early_secs,
                self.params.allowable_late_secs,
                &day.services,
            );
            let Some(spatial) =
                best_match(block, &candidates, &report.location, config, &self.params)
            else {
                continue;
            };
            let closer = best
                .as_ref()
                .map(|(_, current)| spatial.distance_from_segment < current.distance_from_segment)
                .unwrap_or(true);
            if closer {
                best = Some((block.clone(), spatial));
            }
        }
        if let Some((block, _)) = &best {
            debug!(vehicle = %report.vehicle_id, block = %block.id(), "auto-assigned");
        }
        best
    }

    fn emit_stop_events(
        &self,
        block: &Arc<Block>,
        state: &mut VehicleState,
        matched: &Match,
        day: &ServiceDay,
    ) {
        let prev = state.current_match().cloned();
        let mut last_arrival = state.last_arrival.clone();
        let events = derive_events(
            block,
            prev.as_ref(),
            matched,
            &mut last_arrival,
            day.start_epoch,
        );
        state.last_arrival = last_arrival;

        for event in events {
            if event.is_arrival {
                self.maybe_recommend_holding(block, matched, &event, day);
            } else if let Some(headway) = lock(&self.headways).record_departure(
                &event.route_id,
                &event.stop_id,
                &event.vehicle_id,
                event.time,
            ) {
                self.sink.headway(headway);
            }
            self.sink.arrival_departure(event);
        }
    }

    fn maybe_recommend_holding(
        &self,
        block: &Arc<Block>,
        matched: &Match,
        arrival: &ArrivalDeparture,
        day: &ServiceDay,
    ) {
        let Some(target) = self.params.target_headway_secs else {
            return;
        };
        let Some(trip) = block.trip(matched.spatial.trip_index) else {
            return;
        };
        let holds_here = trip
            .pattern()
            .stop_path(arrival.stop_path_index)
            .map(|p| p.is_wait_stop)
            .unwrap_or(false);
        if !holds_here {
            return;
        }

        let leader_departure = lock(&self.headways)
            .last_departure(&arrival.route_id, &arrival.stop_id)
            .map(|(_, time)| time);
        let scheduled_departure = trip
            .schedule_time(arrival.stop_path_index)
            .and_then(|st| st.departure)
            .map(|secs| day.start_epoch + secs as i64);

        let hold = holding::recommend(
            arrival.vehicle_id.clone(),
            arrival.stop_id.clone(),
            arrival.trip_id.clone(),
            arrival.time,
            scheduled_departure,
            leader_departure,
            target,
            self.params.max_holding_secs,
        );
        self.sink.holding_time(hold);
    }

    // Record the diagnostic; whether the vehicle becomes unpredictable
    // is the caller's call, via [`MatchingEngine::make_unpredictable`].
    fn report_no_match(&self, report: &AvlReport, reason: &NoMatchReason) {
        self.sink.vehicle_event(VehicleEvent {
            vehicle_id: report.vehicle_id.clone(),
            time: report.time,
            kind: VehicleEventKind::NoMatch,
            description: format!("{:?}", reason),
        });
    }

    /// Drop a vehicle's assignment and tracking state. Emits an
    /// assignment-lost diagnostic when the vehicle was predictable.
    pub fn make_unpredictable(&self, vehicle_id: &VehicleIdentifier) {
        let mut vehicles = self
            .vehicles
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = vehicles.get_mut(vehicle_id) {
            if state.predictable {
                self.sink.vehicle_event(VehicleEvent {
                    vehicle_id: vehicle_id.clone(),
                    time: state.last_report.as_ref().map(|r| r.time).unwrap_or(0),
                    kind: VehicleEventKind::AssignmentLost,
                    description: "made unpredictable".to_string(),
                });
            }
            state.make_unpredictable();
        }
    }

    /// Current state of a vehicle, if it is being tracked.
    pub fn vehicle_state(&self, vehicle_id: &VehicleIdentifier) -> Option<VehicleState> {
        self.vehicles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(vehicle_id)
            .cloned()
    }

    fn store_state(&self, state: VehicleState) {
        self.vehicles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(state.vehicle_id.clone(), state);
    }

    /// Trips of a block eligible to match at `secs_into_day`, under the
    /// current service day.
    pub fn active_trips(
        &self,
        block_id: &BlockIdentifier,
        secs_into_day: i32,
    ) -> Result<Vec<TripIdentifier>> {
        let config = self.cache.config(self.revision)?;
        let block = config
            .block(block_id)
            .ok_or_else(|| crate::model::EngineError::BlockNotFound(block_id.clone()))?;
        let services = lock(&self.day)
            .as_ref()
            .map(|day| day.services.clone())
            .unwrap_or_default();
        let ids = block
            .trips_active_at(
                secs_into_day,
                self.params.layover_early_secs,
                self.params.allowable_late_secs,
                &services,
            )
            .into_iter()
            .filter_map(|index| block.trip(index).map(|t| t.id().clone()))
            .collect();
        Ok(ids)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
