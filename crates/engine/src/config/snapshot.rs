//! Immutable route-configuration snapshots.
//!
//! A snapshot is built once per configuration revision and read-only
//! thereafter, so matcher threads share it without locking. This type is
//! cheap to clone since all data is stored in `Arc`s.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use rstar::{RTree, RTreeObject, AABB};
use tracing::warn;

use crate::geometry::{Location, METERS_PER_DEGREE};
use crate::identifiers::*;
use crate::model::{Block, EngineError, Result, Route, Stop, TripPattern};
use crate::model::trip::Trip;

/// Overlap between consecutive trips tolerated before a block is flagged.
const TRIP_OVERLAP_TOLERANCE_SECS: i32 = 120;

/// Identifies one published revision of the route configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfigRevision(pub i32);

impl fmt::Display for ConfigRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rev{}", self.0)
    }
}

/// Raw configuration as delivered by a [`super::cache::BlockSource`].
pub struct ConfigData {
    pub stops: Vec<Stop>,
    pub routes: Vec<Route>,
    pub blocks: Vec<Block>,
}

/// R-tree entry: one trip pattern with the blocks that use it.
struct PatternNode {
    pattern: Arc<TripPattern>,
    block_ids: Vec<BlockIdentifier>,
}

impl RTreeObject for PatternNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.pattern.extent().to_aabb()
    }
}

/// One revision's stops, routes, blocks, trips, and patterns, with a
/// spatial index over pattern extents.
pub struct RouteConfig {
    revision: ConfigRevision,
    stops: HashMap<StopIdentifier, Arc<Stop>>,
    routes: HashMap<RouteIdentifier, Arc<Route>>,
    blocks: HashMap<BlockIdentifier, Arc<Block>>,
    // Trip id to owning block and position within it
    trips: HashMap<TripIdentifier, (Arc<Block>, usize)>,
    patterns: HashMap<PatternIdentifier, Arc<TripPattern>>,
    pattern_tree: RTree<PatternNode>,
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("revision", &self.revision)
            .field("stops", &self.stops.len())
            .field("routes", &self.routes.len())
            .field("blocks", &self.blocks.len())
            .field("trips", &self.trips.len())
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

impl RouteConfig {
    pub fn from_data(revision: ConfigRevision, data: ConfigData) -> Result<Self> {
        let stops: HashMap<_, _> = data
            .stops
            .into_iter()
            .map(|s| (s.id.clone(), Arc::new(s)))
            .collect();
        let routes: HashMap<_, _> = data
            .routes
            .into_iter()
            .map(|r| (r.id.clone(), Arc::new(r)))
            .collect();

        let mut blocks = HashMap::new();
        let mut trips = HashMap::new();
        let mut patterns: HashMap<PatternIdentifier, Arc<TripPattern>> = HashMap::new();
        let mut pattern_blocks: HashMap<PatternIdentifier, Vec<BlockIdentifier>> = HashMap::new();

        for block in data.blocks {
            let block = Arc::new(block);
            if blocks.insert(block.id().clone(), block.clone()).is_some() {
                return Err(EngineError::InvalidData(format!(
                    "Duplicate block id {}",
                    block.id()
                )));
            }
            if let Some(index) = block.first_overlapping_trip(TRIP_OVERLAP_TOLERANCE_SECS) {
                // Damaged schedule, but one sloppy block should not take
                // the whole revision down
                warn!(block = %block.id(), trip_index = index, "trips overlap in time");
            }
            for (index, trip) in block.trips().iter().enumerate() {
                if trips
                    .insert(trip.id().clone(), (block.clone(), index))
                    .is_some()
                {
                    return Err(EngineError::InvalidData(format!(
                        "Trip {} appears in more than one block",
                        trip.id()
                    )));
                }
                let pattern = trip.pattern();
                patterns
                    .entry(pattern.id().clone())
                    .or_insert_with(|| pattern.clone());
                let users = pattern_blocks.entry(pattern.id().clone()).or_default();
                if !users.contains(block.id()) {
                    users.push(block.id().clone());
                }
            }
        }

        let nodes: Vec<PatternNode> = patterns
            .values()
            .map(|pattern| PatternNode {
                pattern: pattern.clone(),
                block_ids: pattern_blocks
                    .get(pattern.id())
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        let pattern_tree = RTree::bulk_load(nodes);

        Ok(Self {
            revision,
            stops,
            routes,
            blocks,
            trips,
            patterns,
            pattern_tree,
        })
    }

    pub fn revision(&self) -> ConfigRevision {
        self.revision
    }

    pub fn stop(&self, id: &StopIdentifier) -> Option<&Arc<Stop>> {
        self.stops.get(id)
    }

    pub fn route(&self, id: &RouteIdentifier) -> Option<&Arc<Route>> {
        self.routes.get(id)
    }

    pub fn block(&self, id: &BlockIdentifier) -> Option<&Arc<Block>> {
        self.blocks.get(id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Arc<Block>> {
        self.blocks.values()
    }

    /// The block a trip belongs to and the trip's index within it.
    pub fn trip(&self, id: &TripIdentifier) -> Option<(&Arc<Block>, usize)> {
        self.trips.get(id).map(|(block, index)| (block, *index))
    }

    pub fn trip_by_id(&self, id: &TripIdentifier) -> Option<&Arc<Trip>> {
        let (block, index) = self.trips.get(id)?;
        block.trip(*index)
    }

    pub fn pattern(&self, id: &PatternIdentifier) -> Option<&Arc<TripPattern>> {
        self.patterns.get(id)
    }

    /// Patterns whose extent lies within `radius_m` of `loc`.
    ///
    /// Two-stage filter: an envelope query in degrees first, then the
    /// extent's own conservative distance test on the survivors.
    pub fn patterns_near(&self, loc: &Location, radius_m: f64) -> Vec<&Arc<TripPattern>> {
        self.pattern_nodes_near(loc, radius_m)
            .into_iter()
            .map(|node| &node.pattern)
            .collect()
    }

    /// Blocks with at least one pattern near `loc`, for assigning
    /// vehicles that report without a block.
    pub fn blocks_near(&self, loc: &Location, radius_m: f64) -> Vec<&Arc<Block>> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for node in self.pattern_nodes_near(loc, radius_m) {
            for block_id in &node.block_ids {
                if seen.insert(block_id.clone()) {
                    if let Some(block) = self.blocks.get(block_id) {
                        found.push(block);
                    }
                }
            }
        }
        found
    }

    fn pattern_nodes_near(&self, loc: &Location, radius_m: f64) -> Vec<&PatternNode> {
        let lat_margin = radius_m / METERS_PER_DEGREE;
        let lon_margin = radius_m / (METERS_PER_DEGREE * loc.lat.to_radians().cos());
        let search = AABB::from_corners(
            [loc.lon - lon_margin, loc.lat - lat_margin],
            [loc.lon + lon_margin, loc.lat + lat_margin],
        );
        self.pattern_tree
            .locate_in_envelope_intersecting(&search)
            .filter(|node| node.pattern.extent().is_within_distance(loc, radius_m))
            .collect()
    }
}
