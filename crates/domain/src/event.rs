use crate::shared::entity::ID;
use chrono::{prelude::*, Duration, LocalResult};
use chrono_tz::Tz;

/// Hour of the day used as start time for `Event`s that only have a date
const DEFAULT_START_HOUR: u32 = 12;

/// An `Event` as published by the event store. This service never
/// mutates events, it only reads them to find out which reminders to schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: ID,
    pub title: String,
    /// Calendar date of the event in the configured local timezone
    pub date: NaiveDate,
    /// Local time of day, not every event has one
    pub time: Option<NaiveTime>,
    pub location_name: Option<String>,
    pub cancelled: bool,
    pub hidden: bool,
}

impl Event {
    /// Events without a time of day start at local noon
    pub fn default_start_time() -> NaiveTime {
        NaiveTime::from_hms_opt(DEFAULT_START_HOUR, 0, 0).unwrap_or_default()
    }

    pub fn local_start(&self) -> NaiveDateTime {
        self.date
            .and_time(self.time.unwrap_or_else(Self::default_start_time))
    }

    /// The instant the event starts, resolving the local start in `tz`.
    ///
    /// An ambiguous local time (clocks turned back) resolves to the earliest
    /// instant and a local time inside a DST gap is moved forward one hour,
    /// so the same event always yields the same start.
    pub fn start_datetime(&self, tz: &Tz) -> DateTime<Utc> {
        let local = self.local_start();
        let start = match tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => match tz.from_local_datetime(&(local + Duration::hours(1))) {
                LocalResult::Single(dt) => dt,
                LocalResult::Ambiguous(earliest, _) => earliest,
                LocalResult::None => tz.from_utc_datetime(&local),
            },
        };
        start.with_timezone(&Utc)
    }

    /// Cancelled or hidden events never get reminders
    pub fn is_active(&self) -> bool {
        !self.cancelled && !self.hidden
    }
}
