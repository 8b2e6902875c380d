use crate::event::Event;
use chrono::{prelude::*, Duration};
use chrono_tz::Tz;

/// The `[start, end]` interval a single scheduler run looks at
#[derive(Debug, Clone, PartialEq)]
pub struct LookaheadWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// An active `Event` with its resolved start inside a `LookaheadWindow`
#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingEvent {
    pub event: Event,
    pub start: DateTime<Utc>,
}

impl LookaheadWindow {
    pub fn new(now: DateTime<Utc>, horizon: Duration) -> Self {
        Self {
            start: now,
            end: now + horizon,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Both ends are inclusive
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start <= *ts && *ts <= self.end
    }

    /// A reminder can only be scheduled strictly after the start of the
    /// window and not later than its end
    pub fn admits_fire_time(&self, fire_at: &DateTime<Utc>) -> bool {
        self.start < *fire_at && *fire_at <= self.end
    }

    /// Local calendar dates in `tz` that can hold events starting inside the
    /// window. Used to narrow the query against the event store, the exact
    /// filtering is done by `select_events`.
    pub fn date_range(&self, tz: &Tz) -> (NaiveDate, NaiveDate) {
        let first = self.start.with_timezone(tz).date_naive();
        let last = self.end.with_timezone(tz).date_naive();
        (
            first.pred_opt().unwrap_or(first),
            last.succ_opt().unwrap_or(last),
        )
    }

    /// Active events starting inside the window, in order of their start
    pub fn select_events(&self, events: Vec<Event>, tz: &Tz) -> Vec<UpcomingEvent> {
        let mut upcoming = events
            .into_iter()
            .filter(Event::is_active)
            .map(|event| UpcomingEvent {
                start: event.start_datetime(tz),
                event,
            })
            .filter(|e| self.contains(&e.start))
            .collect::<Vec<_>>();
        upcoming.sort_by(|e1, e2| {
            e1.start
                .cmp(&e2.start)
                .then_with(|| e1.event.id.cmp(&e2.event.id))
        });
        upcoming
    }
}
