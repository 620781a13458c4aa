//! Routes and their display ordering.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::identifiers::RouteIdentifier;

/// Where a route sorts in operator-facing listings.
///
/// `Beginning` pins a route before every numbered route and `End` after
/// them; numbered routes sort naturally among themselves. The sentinels
/// are explicit variants rather than magic order values compared against
/// themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOrdering {
    Beginning,
    Value(u32),
    End,
}

impl Ord for RouteOrdering {
    fn cmp(&self, other: &Self) -> Ordering {
        use RouteOrdering::*;
        match (self, other) {
            (Beginning, Beginning) | (End, End) => Ordering::Equal,
            (Beginning, _) => Ordering::Less,
            (_, Beginning) => Ordering::Greater,
            (End, _) => Ordering::Greater,
            (_, End) => Ordering::Less,
            (Value(a), Value(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for RouteOrdering {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Debug)]
pub struct Route {
    pub id: RouteIdentifier,
    pub short_name: Arc<str>,
    pub long_name: Arc<str>,
    pub ordering: RouteOrdering,
    /// Per-route override of the fleet-wide maximum distance a fix may be
    /// from a segment and still match.
    pub max_distance_from_segment: Option<f64>,
}

impl Route {
    pub fn new(
        id: RouteIdentifier,
        short_name: impl AsRef<str>,
        long_name: impl AsRef<str>,
    ) -> Self {
        Self {
            id,
            short_name: short_name.as_ref().into(),
            long_name: long_name.as_ref().into(),
            ordering: RouteOrdering::End,
            max_distance_from_segment: None,
        }
    }

    pub fn with_ordering(mut self, ordering: RouteOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_max_distance_from_segment(mut self, meters: f64) -> Self {
        self.max_distance_from_segment = Some(meters);
        self
    }

    /// Ordering for listings: the explicit ordering first, then the short
    /// name as tie-break.
    pub fn display_cmp(&self, other: &Route) -> Ordering {
        self.ordering
            .cmp(&other.ordering)
            .then_with(|| self.short_name.cmp(&other.short_name))
    }
}
