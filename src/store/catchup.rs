//! # Catch-up Coordinator
//!
//! Works out which stored hour is missing after downtime and builds the
//! backfill request for the roof unit. The roof unit only keeps the current
//! day's hours, so the backlog is limited to the day the station booted.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;

use super::latest::LatestPointer;
use crate::record::protocol::{next_hour, truncate_to_hour, RecordKind};

/// Backfill request for one hour of one day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchupRequest {
    pub kind: RecordKind,
    /// Day of month
    pub day: u32,
    pub hour: u32,
}

impl fmt::Display for CatchupRequest {
    /// Request line `<H|D><dd>:<hh>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}:{:02}", self.kind.marker(), self.day, self.hour)
    }
}

/// Catch-up coordinator
#[derive(Debug, Clone)]
pub struct CatchupCoordinator {
    /// Boot time; hours up to and including its hour are owed by the roof
    horizon: NaiveDateTime,
}

impl CatchupCoordinator {
    pub fn new(horizon: NaiveDateTime) -> Self {
        Self { horizon }
    }

    pub fn horizon(&self) -> NaiveDateTime {
        self.horizon
    }

    /// Next hourly record owed by the roof unit, if any
    ///
    /// The next expected hour follows the stored pointer. A gap reaching back
    /// before the horizon day is cut to hour 0 of that day; earlier days are
    /// not requested. Nothing after the horizon hour or the current hour is
    /// ever requested.
    pub fn due(&self, latest: &LatestPointer, now: NaiveDateTime) -> Option<CatchupRequest> {
        let horizon_day = self.horizon.date();
        let mut next = next_hour(latest.hourly);
        if next.date() < horizon_day {
            next = horizon_day.and_time(NaiveTime::MIN);
        }

        let owed = next.date() == horizon_day
            && next.hour() <= self.horizon.hour()
            && next <= truncate_to_hour(now);

        owed.then(|| CatchupRequest {
            kind: RecordKind::Hourly,
            day: next.day(),
            hour: next.hour(),
        })
    }
}
