//! Service calendars and the three-day validity context used by the
//! activity window.
//!
//! Implements GTFS calendar.txt and calendar_dates.txt logic, plus the
//! yesterday/today/tomorrow service-id sets that let trips crossing
//! midnight be matched without keeping explicit day state.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::collections::HashSet;
use std::sync::Arc;

use crate::identifiers::ServiceIdentifier;
use crate::model::types::SECONDS_PER_DAY;

/// Determines which days a transit service operates
#[derive(Clone, Debug)]
pub struct ServiceCalendar {
    pub service_id: ServiceIdentifier,

    // Regular schedule
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weekdays: WeekdayFlags,

    // Exception dates
    pub added_dates: Arc<HashSet<NaiveDate>>,   // Service runs on these dates
    pub removed_dates: Arc<HashSet<NaiveDate>>, // Service does not run on these dates
}

/// Compact representation of which weekdays a service runs
#[derive(Clone, Copy, Debug, Default)]
pub struct WeekdayFlags {
    pub(crate) flags: u8,
}

impl WeekdayFlags {
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    pub fn every_day() -> Self {
        // number_from_monday is 1-based, so the usable bits are 1..=7
        Self { flags: 0b1111_1110 }
    }

    pub fn set(&mut self, weekday: Weekday) {
        self.flags |= 1 << weekday.number_from_monday();
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        (self.flags & (1 << weekday.number_from_monday())) != 0
    }

    pub fn from_bools(
        mon: bool,
        tue: bool,
        wed: bool,
        thu: bool,
        fri: bool,
        sat: bool,
        sun: bool,
    ) -> Self {
        let mut flags = Self::new();
        if mon {
            flags.set(Weekday::Mon);
        }
        if tue {
            flags.set(Weekday::Tue);
        }
        if wed {
            flags.set(Weekday::Wed);
        }
        if thu {
            flags.set(Weekday::Thu);
        }
        if fri {
            flags.set(Weekday::Fri);
        }
        if sat {
            flags.set(Weekday::Sat);
        }
        if sun {
            flags.set(Weekday::Sun);
        }
        flags
    }
}

impl ServiceCalendar {
    /// A calendar valid every day of the given range, with no exceptions.
    pub fn daily(
        service_id: ServiceIdentifier,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            service_id,
            start_date,
            end_date,
            weekdays: WeekdayFlags::every_day(),
            added_dates: Arc::new(HashSet::new()),
            removed_dates: Arc::new(HashSet::new()),
        }
    }

    /// Check if the service runs on a given date
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        // Check explicit additions first
        if self.added_dates.contains(&date) {
            return true;
        }

        // Check explicit removals
        if self.removed_dates.contains(&date) {
            return false;
        }

        // Check regular schedule
        if date < self.start_date || date > self.end_date {
            return false;
        }

        self.weekdays.contains(date.weekday())
    }
}

/// The service day, relative to the day an AVL report's seconds-into-day
/// value was computed for, that a time probe belongs to.
///
/// A fix shortly after midnight can belong to a trip of yesterday's
/// service day; probing the fix time shifted by one day against the trip
/// window covers that without any persisted day state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayOffset {
    Yesterday,
    Today,
    Tomorrow,
}

impl DayOffset {
    pub const ALL: [DayOffset; 3] = [DayOffset::Today, DayOffset::Yesterday, DayOffset::Tomorrow];

    /// Seconds to add to a seconds-into-day value to express it in this
    /// service day's frame. A fix at 00:05 today is 24:05 of yesterday's
    /// service day, hence +86400 for `Yesterday`.
    pub fn probe_seconds(&self) -> i32 {
        match self {
            DayOffset::Today => 0,
            DayOffset::Yesterday => SECONDS_PER_DAY,
            DayOffset::Tomorrow => -SECONDS_PER_DAY,
        }
    }
}

/// Which service ids are valid on yesterday, today, and tomorrow.
///
/// Built once per matching pass from the external calendar collaborator
/// and then shared read-only by every activity-window evaluation.
#[derive(Clone, Debug, Default)]
pub struct ServiceContext {
    yesterday: HashSet<ServiceIdentifier>,
    today: HashSet<ServiceIdentifier>,
    tomorrow: HashSet<ServiceIdentifier>,
}

impl ServiceContext {
    pub fn new(
        yesterday: impl IntoIterator<Item = ServiceIdentifier>,
        today: impl IntoIterator<Item = ServiceIdentifier>,
        tomorrow: impl IntoIterator<Item = ServiceIdentifier>,
    ) -> Self {
        Self {
            yesterday: yesterday.into_iter().collect(),
            today: today.into_iter().collect(),
            tomorrow: tomorrow.into_iter().collect(),
        }
    }

    /// Evaluate a set of calendars for the three days around `today`.
    pub fn from_calendars(calendars: &[ServiceCalendar], today: NaiveDate) -> Self {
        let day = |date: NaiveDate| {
            calendars
                .iter()
                .filter(|c| c.runs_on(date))
                .map(|c| c.service_id.clone())
                .collect::<HashSet<_>>()
        };
        Self {
            yesterday: day(today - Days::new(1)),
            today: day(today),
            tomorrow: day(today + Days::new(1)),
        }
    }

    pub fn is_valid(&self, day: DayOffset, service: &ServiceIdentifier) -> bool {
        match day {
            DayOffset::Yesterday => self.yesterday.contains(service),
            DayOffset::Today => self.today.contains(service),
            DayOffset::Tomorrow => self.tomorrow.contains(service),
        }
    }

    /// A context where the given service is valid on all three days.
    /// Mostly useful in tests and for frequency-based services that run
    /// around the clock.
    pub fn always(service: ServiceIdentifier) -> Self {
        let set: HashSet<_> = [service].into_iter().collect();
        Self {
            yesterday: set.clone(),
            today: set.clone(),
            tomorrow: set,
        }
    }

    /// The same context with every day shifted one day later: what was
    /// valid today becomes valid yesterday, and tomorrow becomes today.
    /// The day after tomorrow is unknown and left empty.
    pub fn shifted_later(&self) -> Self {
        Self {
            yesterday: self.today.clone(),
            today: self.tomorrow.clone(),
            tomorrow: HashSet::new(),
        }
    }
}
